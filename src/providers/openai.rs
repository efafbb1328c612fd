use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::retry::send_with_backoff;
use super::{ChatMessage, ChatReply, GeneratedImage, OpenAIConfig};

const ALLOWED_ROLES: &[&str] = &["system", "user", "assistant"];

#[derive(Debug, Clone)]
pub struct OpenAI {
    client: reqwest::Client,
    config: OpenAIConfig,
}

impl OpenAI {
    pub fn new(client: reqwest::Client, config: OpenAIConfig) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config
            .key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }

    fn key(&self) -> Result<&str> {
        self.config
            .key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is not configured"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    pub async fn chat(&self, messages: &[ChatMessage], model: Option<&str>) -> Result<ChatReply> {
        validate_messages(messages)?;
        let key = self.key()?;
        let model = model
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(self.config.chat_model.as_str());
        let body = json!({
            "model": model,
            "messages": messages,
        });
        let url = self.url("chat/completions");
        debug!("chat completion with {} message(s) on {}", messages.len(), model);

        let (status, text) =
            send_with_backoff("OpenAI", || self.client.post(&url).bearer_auth(key).json(&body))
                .await?;
        if !status.is_success() {
            return Err(anyhow!(
                "OpenAI API error ({}): {}",
                status,
                extract_openai_error(&text).unwrap_or(text)
            ));
        }
        extract_chat_reply(&text, model)
    }

    pub async fn generate_image(&self, prompt: &str, size: Option<&str>) -> Result<GeneratedImage> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(anyhow!("prompt is empty"));
        }
        let key = self.key()?;
        let size = size
            .map(str::trim)
            .filter(|size| !size.is_empty())
            .unwrap_or(self.config.image_size.as_str());
        let body = json!({
            "model": self.config.image_model,
            "prompt": prompt,
            "n": 1,
            "size": size,
        });
        let url = self.url("images/generations");

        let (status, text) =
            send_with_backoff("OpenAI", || self.client.post(&url).bearer_auth(key).json(&body))
                .await?;
        if !status.is_success() {
            return Err(anyhow!(
                "OpenAI API error ({}): {}",
                status,
                extract_openai_error(&text).unwrap_or(text)
            ));
        }
        extract_generated_image(&text)
    }
}

pub(crate) fn validate_messages(messages: &[ChatMessage]) -> Result<()> {
    if messages.is_empty() {
        return Err(anyhow!("messages are empty"));
    }
    for message in messages {
        if !ALLOWED_ROLES.contains(&message.role.as_str()) {
            return Err(anyhow!("unsupported message role '{}'", message.role));
        }
    }
    Ok(())
}

fn extract_chat_reply(text: &str, fallback_model: &str) -> Result<ChatReply> {
    let payload: ChatCompletion =
        serde_json::from_str(text).with_context(|| "failed to parse OpenAI response JSON")?;
    let reply = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("no message returned from OpenAI"))?;
    let model = payload
        .model
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    Ok(ChatReply { reply, model })
}

fn extract_generated_image(text: &str) -> Result<GeneratedImage> {
    let payload: ImageResponse =
        serde_json::from_str(text).with_context(|| "failed to parse OpenAI image response JSON")?;
    let image = payload
        .data
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no image returned from OpenAI"))?;
    if image.url.is_none() && image.b64_json.is_none() {
        return Err(anyhow!("OpenAI image response has neither url nor b64_json"));
    }
    Ok(GeneratedImage {
        url: image.url,
        b64_json: image.b64_json,
        revised_prompt: image.revised_prompt,
    })
}

fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAIError>,
    }

    #[derive(Deserialize)]
    struct OpenAIError {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    let parts = [
        error.message,
        error.kind.map(|kind| format!("type: {}", kind)),
        error.code.map(|code| format!("code: {}", code)),
    ];
    let parts = parts
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>();
    if parts.is_empty() {
        Some("unknown error".to_string())
    } else {
        Some(parts.join(" | "))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
    revised_prompt: Option<String>,
}
