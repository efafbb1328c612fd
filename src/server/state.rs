use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::providers::OpenAI;
use crate::{VisionPipeline, build_pipeline, http_client, settings};

#[derive(Clone)]
pub struct ServerState {
    pub(crate) settings: settings::Settings,
    pub(crate) pipeline: Arc<VisionPipeline>,
    pub(crate) openai: OpenAI,
    pub(crate) shutdown: CancellationToken,
}

impl ServerState {
    pub fn from_settings(settings: settings::Settings) -> Result<Self> {
        let client = http_client()?;
        let pipeline = build_pipeline(&settings, client.clone());
        let openai = OpenAI::new(client, settings.openai_config());
        Ok(Self {
            settings,
            pipeline: Arc::new(pipeline),
            openai,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
