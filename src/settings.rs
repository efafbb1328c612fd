use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ocr::{PollPolicy, UnknownStatusPolicy, VisionConfig};
use crate::providers::OpenAIConfig;
use crate::translate::TranslatorConfig;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_addr: String,
    pub server_static_dir: Option<String>,
    pub server_max_upload_bytes: usize,
    pub ocr_endpoint: String,
    pub ocr_key: Option<String>,
    pub ocr_language: Option<String>,
    pub ocr_poll_interval: Duration,
    pub ocr_max_attempts: u32,
    pub ocr_unknown_status: UnknownStatusPolicy,
    pub translator_endpoint: String,
    pub translator_key: Option<String>,
    pub translator_region: Option<String>,
    pub translator_default_lang: String,
    pub openai_base_url: String,
    pub openai_key: Option<String>,
    pub openai_chat_model: String,
    pub openai_image_model: String,
    pub openai_image_size: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3000".to_string(),
            server_static_dir: None,
            server_max_upload_bytes: 10 * 1024 * 1024,
            ocr_endpoint: String::new(),
            ocr_key: None,
            ocr_language: None,
            ocr_poll_interval: Duration::from_secs(1),
            ocr_max_attempts: 10,
            ocr_unknown_status: UnknownStatusPolicy::Fail,
            translator_endpoint: String::new(),
            translator_key: None,
            translator_region: None,
            translator_default_lang: "en".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_key: None,
            openai_chat_model: "gpt-4o-mini".to_string(),
            openai_image_model: "dall-e-3".to_string(),
            openai_image_size: "1024x1024".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    ocr: Option<OcrSettings>,
    translator: Option<TranslatorSettings>,
    openai: Option<OpenAISettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
    static_dir: Option<String>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    endpoint: Option<String>,
    language: Option<String>,
    poll_interval_ms: Option<u64>,
    max_attempts: Option<u32>,
    unknown_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslatorSettings {
    endpoint: Option<String>,
    region: Option<String>,
    default_lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAISettings {
    base_url: Option<String>,
    chat_model: Option<String>,
    image_model: Option<String>,
    image_size: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults)?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            settings.merge_file(&path)?;
        }
    }

    settings.apply_env(get_env);
    Ok(settings)
}

impl Settings {
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings: {}", path.display()))?;
        let parsed: SettingsFile = toml::from_str(&content)
            .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        self.merge(parsed)
            .with_context(|| format!("invalid settings: {}", path.display()))
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(server) = incoming.server {
            if let Some(addr) = non_empty(server.addr) {
                self.server_addr = addr;
            }
            if let Some(dir) = non_empty(server.static_dir) {
                self.server_static_dir = Some(dir);
            }
            if let Some(limit) = server.max_upload_bytes {
                if limit > 0 {
                    self.server_max_upload_bytes = limit;
                }
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(endpoint) = non_empty(ocr.endpoint) {
                self.ocr_endpoint = endpoint;
            }
            if let Some(language) = non_empty(ocr.language) {
                self.ocr_language = Some(language);
            }
            if let Some(interval) = ocr.poll_interval_ms {
                self.ocr_poll_interval = Duration::from_millis(interval);
            }
            if let Some(attempts) = ocr.max_attempts {
                if attempts == 0 {
                    return Err(anyhow!("ocr.max_attempts must be at least 1"));
                }
                self.ocr_max_attempts = attempts;
            }
            if let Some(policy) = non_empty(ocr.unknown_status) {
                self.ocr_unknown_status = policy.parse()?;
            }
        }
        if let Some(translator) = incoming.translator {
            if let Some(endpoint) = non_empty(translator.endpoint) {
                self.translator_endpoint = endpoint;
            }
            if let Some(region) = non_empty(translator.region) {
                self.translator_region = Some(region);
            }
            if let Some(lang) = non_empty(translator.default_lang) {
                self.translator_default_lang = lang;
            }
        }
        if let Some(openai) = incoming.openai {
            if let Some(url) = non_empty(openai.base_url) {
                self.openai_base_url = url;
            }
            if let Some(model) = non_empty(openai.chat_model) {
                self.openai_chat_model = model;
            }
            if let Some(model) = non_empty(openai.image_model) {
                self.openai_image_model = model;
            }
            if let Some(size) = non_empty(openai.image_size) {
                self.openai_image_size = size;
            }
        }
        Ok(())
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("AZURE_VISION_ENDPOINT") {
            self.ocr_endpoint = endpoint;
        }
        if let Some(key) = lookup("AZURE_VISION_KEY") {
            self.ocr_key = Some(key);
        }
        if let Some(endpoint) = lookup("AZURE_TRANSLATOR_ENDPOINT") {
            self.translator_endpoint = endpoint;
        }
        if let Some(key) = lookup("AZURE_TRANSLATOR_KEY") {
            self.translator_key = Some(key);
        }
        if let Some(region) = lookup("AZURE_TRANSLATOR_REGION") {
            self.translator_region = Some(region);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.openai_base_url = url;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.openai_key = Some(key);
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.ocr_poll_interval,
            max_attempts: self.ocr_max_attempts,
            unknown_status: self.ocr_unknown_status,
        }
    }

    pub fn vision_config(&self) -> VisionConfig {
        VisionConfig {
            endpoint: self.ocr_endpoint.clone(),
            key: self.ocr_key.clone(),
            language: self.ocr_language.clone(),
        }
    }

    pub fn translator_config(&self) -> TranslatorConfig {
        TranslatorConfig {
            endpoint: self.translator_endpoint.clone(),
            key: self.translator_key.clone(),
            region: self.translator_region.clone(),
        }
    }

    pub fn openai_config(&self) -> OpenAIConfig {
        OpenAIConfig {
            base_url: self.openai_base_url.clone(),
            key: self.openai_key.clone(),
            chat_model: self.openai_chat_model.clone(),
            image_model: self.openai_image_model.clone(),
            image_size: self.openai_image_size.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".vision-relay"))
        }
    })
}
