use serde::{Deserialize, Serialize};

use crate::pipeline::OcrOutcome;
use crate::providers::ChatMessage;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct OcrJsonRequest {
    pub(crate) image_base64: Option<String>,
    pub(crate) image_mime: Option<String>,
    pub(crate) lang: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    pub extracted_text: String,
    pub translated_text: String,
    pub target_language: String,
}

impl From<&OcrOutcome> for OcrResponse {
    fn from(outcome: &OcrOutcome) -> Self {
        Self {
            extracted_text: outcome.extracted_text().to_string(),
            translated_text: outcome.translated_text().to_string(),
            target_language: outcome.target_lang.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct ChatRequest {
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) model: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct ImageRequest {
    pub(crate) prompt: String,
    pub(crate) size: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}
