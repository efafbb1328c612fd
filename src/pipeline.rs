use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::OcrError;
use crate::ocr::{Extraction, ImageUpload, OcrJob, OcrService, PollPolicy, poll_until_complete};
use crate::translate::{TextTranslator, TranslationOutcome, resolve_target_lang};

#[derive(Debug, Clone, Default)]
pub struct OcrRequest {
    pub image: Option<Vec<u8>>,
    pub mime: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug)]
pub struct OcrOutcome {
    pub extraction: Extraction,
    pub translation: TranslationOutcome,
    pub target_lang: String,
    pub attempts: u32,
}

impl OcrOutcome {
    pub fn extracted_text(&self) -> &str {
        self.extraction.display_text()
    }

    pub fn translated_text(&self) -> &str {
        self.translation.text()
    }
}

/// Image → OCR job → poll → extraction → optional translation.
#[derive(Debug)]
pub struct OcrPipeline<O, T> {
    ocr: O,
    translator: T,
    policy: PollPolicy,
    default_lang: String,
}

impl<O, T> OcrPipeline<O, T>
where
    O: OcrService,
    T: TextTranslator,
{
    pub fn new(ocr: O, translator: T, policy: PollPolicy, default_lang: impl Into<String>) -> Self {
        Self {
            ocr,
            translator,
            policy,
            default_lang: default_lang.into(),
        }
    }

    pub async fn run(
        &self,
        request: OcrRequest,
        cancel: &CancellationToken,
    ) -> Result<OcrOutcome, OcrError> {
        let Some(bytes) = request.image else {
            return Err(OcrError::ClientInput("image is required".to_string()));
        };
        let image = ImageUpload::new(bytes, request.mime.as_deref())?;
        let target_lang = resolve_target_lang(request.lang.as_deref(), &self.default_lang);

        let handle = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OcrError::Cancelled),
            handle = self.ocr.submit(&image) => handle?,
        };
        let mut job = OcrJob::new(handle);
        let pages = poll_until_complete(&self.ocr, &mut job, &self.policy, cancel).await?;
        let extraction = Extraction::from_pages(pages);
        info!(
            "OCR complete: {} page(s), {} chars, {} poll(s)",
            extraction.pages().len(),
            extraction.text().len(),
            job.attempts()
        );

        let translation = if extraction.is_empty() {
            TranslationOutcome::Skipped
        } else {
            let translate = self.translator.translate(extraction.text(), &target_lang);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(OcrError::Cancelled),
                result = translate => match result {
                    Ok(text) => TranslationOutcome::Translated(text),
                    Err(err) => {
                        warn!("translation to '{}' unavailable: {}", target_lang, err);
                        TranslationOutcome::Unavailable(err)
                    }
                },
            }
        };

        Ok(OcrOutcome {
            extraction,
            translation,
            target_lang,
            attempts: job.attempts(),
        })
    }
}
