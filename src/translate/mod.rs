mod azure;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub use azure::{AzureTranslator, TranslatorConfig};

pub const NO_TEXT_TO_TRANSLATE: &str = "No text to translate";
pub const TRANSLATION_UNAVAILABLE: &str = "Translation unavailable";

/// Reasons a translation could not be produced. Never fatal to an OCR request.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translator is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("translation request failed: {0}")]
    Transport(String),

    #[error("translator returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed translation response: {0}")]
    Malformed(String),
}

#[derive(Debug)]
pub enum TranslationOutcome {
    Translated(String),
    /// Extracted text was empty, the translator was not called.
    Skipped,
    Unavailable(TranslateError),
}

impl TranslationOutcome {
    pub fn text(&self) -> &str {
        match self {
            TranslationOutcome::Translated(text) => text,
            TranslationOutcome::Skipped => NO_TEXT_TO_TRANSLATE,
            TranslationOutcome::Unavailable(_) => TRANSLATION_UNAVAILABLE,
        }
    }
}

pub type TranslateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, TranslateError>> + Send + 'a>>;

pub trait TextTranslator: Send + Sync {
    fn translate<'a>(&'a self, text: &'a str, to: &'a str) -> TranslateFuture<'a>;
}

/// Empty or whitespace-only codes fall back to `default_lang`.
pub fn resolve_target_lang(requested: Option<&str>, default_lang: &str) -> String {
    requested
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or(default_lang)
        .to_string()
}
