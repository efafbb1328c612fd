use serde::{Deserialize, Serialize};

mod openai;
mod retry;

pub use openai::OpenAI;
pub(crate) use openai::validate_messages;

#[derive(Debug, Clone, Default)]
pub struct OpenAIConfig {
    pub base_url: String,
    pub key: Option<String>,
    pub chat_model: String,
    pub image_model: String,
    pub image_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}
