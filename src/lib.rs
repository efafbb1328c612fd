use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub mod error;
pub mod logging;
pub mod ocr;
pub mod pipeline;
mod providers;
pub mod server;
pub mod settings;
pub mod translate;

pub use error::{OcrError, UpstreamFailure};
pub use pipeline::{OcrOutcome, OcrPipeline, OcrRequest};
pub use providers::{ChatMessage, ChatReply, GeneratedImage, OpenAI, OpenAIConfig};

pub type VisionPipeline = OcrPipeline<ocr::AzureVision, translate::AzureTranslator>;

pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Config {
    pub data: String,
    pub lang: Option<String>,
    pub timeout: Option<Duration>,
}

pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .with_context(|| "failed to build HTTP client")
}

pub fn build_pipeline(settings: &settings::Settings, client: reqwest::Client) -> VisionPipeline {
    OcrPipeline::new(
        ocr::AzureVision::new(client.clone(), settings.vision_config()),
        translate::AzureTranslator::new(client, settings.translator_config()),
        settings.poll_policy(),
        settings.translator_default_lang.clone(),
    )
}

pub async fn run(config: Config, settings: settings::Settings) -> Result<String> {
    let path = Path::new(&config.data);
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read image: {}", path.display()))?;
    let pipeline = build_pipeline(&settings, http_client()?);

    let cancel = CancellationToken::new();
    if let Some(timeout) = config.timeout {
        let deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!("timed out after {:.1}s; cancelling", timeout.as_secs_f32());
            deadline.cancel();
        });
    }

    let request = OcrRequest {
        image: Some(bytes),
        mime: None,
        lang: config.lang,
    };
    let outcome = pipeline
        .run(request, &cancel)
        .await
        .with_context(|| format!("OCR failed for {}", path.display()))?;
    let response = server::OcrResponse::from(&outcome);
    serde_json::to_string_pretty(&response).with_context(|| "failed to serialize OCR response")
}
