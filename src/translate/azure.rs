use serde::Deserialize;
use serde_json::json;

use super::{TextTranslator, TranslateError, TranslateFuture};
use crate::error::excerpt;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const SUBSCRIPTION_REGION_HEADER: &str = "Ocp-Apim-Subscription-Region";
const API_VERSION: &str = "3.0";

#[derive(Debug, Clone, Default)]
pub struct TranslatorConfig {
    pub endpoint: String,
    pub key: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AzureTranslator {
    client: reqwest::Client,
    config: TranslatorConfig,
}

impl AzureTranslator {
    pub fn new(client: reqwest::Client, config: TranslatorConfig) -> Self {
        Self { client, config }
    }

    async fn translate_text(&self, text: &str, to: &str) -> Result<String, TranslateError> {
        let key = self
            .config
            .key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(TranslateError::NotConfigured("AZURE_TRANSLATOR_KEY is not set"))?;
        let endpoint = self.config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(TranslateError::NotConfigured("translator endpoint is empty"));
        }

        let mut request = self
            .client
            .post(format!("{}/translate", endpoint))
            .query(&[("api-version", API_VERSION), ("to", to)])
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .json(&json!([{ "Text": text }]));
        if let Some(region) = self.config.region.as_deref() {
            request = request.header(SUBSCRIPTION_REGION_HEADER, region);
        }

        let response = request
            .send()
            .await
            .map_err(|err| TranslateError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| TranslateError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(TranslateError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }
        parse_translation(&body)
    }
}

impl TextTranslator for AzureTranslator {
    fn translate<'a>(&'a self, text: &'a str, to: &'a str) -> TranslateFuture<'a> {
        Box::pin(self.translate_text(text, to))
    }
}

pub(crate) fn parse_translation(body: &str) -> Result<String, TranslateError> {
    let items: Vec<TranslationItem> =
        serde_json::from_str(body).map_err(|err| TranslateError::Malformed(err.to_string()))?;
    items
        .into_iter()
        .next()
        .and_then(|item| item.translations.into_iter().next())
        .map(|translation| translation.text)
        .ok_or_else(|| TranslateError::Malformed("no translations returned".to_string()))
}

#[derive(Debug, Deserialize)]
struct TranslationItem {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}
