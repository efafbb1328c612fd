mod azure;
mod extract;
mod poll;

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;

use crate::error::OcrError;

pub use azure::{AzureVision, VisionConfig};
pub use extract::{Extraction, NO_TEXT_FOUND, flatten_pages};
pub use poll::{JobStatus, OcrJob, Transition, poll_until_complete};

const OCTET_STREAM: &str = "application/octet-stream";

/// Raw image payload handed to the OCR service.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    bytes: Vec<u8>,
    mime: String,
}

impl ImageUpload {
    /// Rejects empty payloads; a missing or generic content type is sniffed from the bytes.
    pub fn new(bytes: Vec<u8>, mime: Option<&str>) -> Result<Self, OcrError> {
        if bytes.is_empty() {
            return Err(OcrError::ClientInput("image is empty".to_string()));
        }
        let declared = mime
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty() && value != OCTET_STREAM);
        let mime = declared
            .or_else(|| infer::get(&bytes).map(|kind| kind.mime_type().to_string()))
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        Ok(Self { bytes, mime })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }
}

/// Opaque reference to a submitted job, as returned by the submission call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Unknown(String),
}

impl PollStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "notstarted" => PollStatus::NotStarted,
            "running" | "pending" => PollStatus::Running,
            "succeeded" => PollStatus::Succeeded,
            "failed" => PollStatus::Failed,
            _ => PollStatus::Unknown(raw.trim().to_string()),
        }
    }
}

/// One page of recognized text, lines in service reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub lines: Vec<String>,
}

impl Page {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of a single status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: PollStatus,
    pub pages: Option<Vec<Page>>,
}

impl StatusReport {
    pub fn pending() -> Self {
        Self {
            status: PollStatus::Running,
            pages: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: PollStatus::Failed,
            pages: None,
        }
    }

    pub fn succeeded(pages: Vec<Page>) -> Self {
        Self {
            status: PollStatus::Succeeded,
            pages: Some(pages),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownStatusPolicy {
    /// Keep polling within the attempt budget.
    Continue,
    /// Abort with a protocol error.
    Fail,
}

impl FromStr for UnknownStatusPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(UnknownStatusPolicy::Continue),
            "fail" => Ok(UnknownStatusPolicy::Fail),
            other => Err(anyhow!(
                "unknown_status must be \"continue\" or \"fail\", got '{}'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub unknown_status: UnknownStatusPolicy,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 10,
            unknown_status: UnknownStatusPolicy::Fail,
        }
    }
}

pub type OcrFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, OcrError>> + Send + 'a>>;

/// Submit-then-poll document analysis service.
pub trait OcrService: Send + Sync {
    fn submit<'a>(&'a self, image: &'a ImageUpload) -> OcrFuture<'a, JobHandle>;
    fn poll<'a>(&'a self, handle: &'a JobHandle) -> OcrFuture<'a, StatusReport>;
}
