use std::fmt;

use thiserror::Error;

/// Longest upstream body excerpt carried in an error message.
const MAX_BODY_EXCERPT: usize = 512;

/// Which upstream call an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submit,
    Poll,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Submit => f.write_str("submission"),
            Stage::Poll => f.write_str("poll"),
        }
    }
}

/// Fatal outcomes of an OCR orchestration.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("{0}")]
    ClientInput(String),

    #[error("OCR protocol error: {0}")]
    UpstreamProtocol(String),

    #[error(transparent)]
    UpstreamFailure(#[from] UpstreamFailure),

    #[error("OCR job did not complete after {attempts} poll attempt(s)")]
    Timeout { attempts: u32 },

    #[error("OCR request was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum UpstreamFailure {
    #[error("OCR {stage} returned {status}: {body}")]
    Status {
        stage: Stage,
        status: u16,
        body: String,
    },

    #[error("OCR {stage} request failed: {message}")]
    Transport { stage: Stage, message: String },

    #[error("OCR job reported failure after {attempts} poll attempt(s)")]
    JobFailed { attempts: u32 },
}

impl OcrError {
    pub fn kind(&self) -> &'static str {
        match self {
            OcrError::ClientInput(_) => "client_input",
            OcrError::UpstreamProtocol(_) => "upstream_protocol",
            OcrError::UpstreamFailure(_) => "upstream_failure",
            OcrError::Timeout { .. } => "timeout",
            OcrError::Cancelled => "cancelled",
        }
    }

    pub(crate) fn status(stage: Stage, status: u16, body: &str) -> Self {
        OcrError::UpstreamFailure(UpstreamFailure::Status {
            stage,
            status,
            body: excerpt(body),
        })
    }

    pub(crate) fn transport(stage: Stage, err: impl fmt::Display) -> Self {
        OcrError::UpstreamFailure(UpstreamFailure::Transport {
            stage,
            message: err.to_string(),
        })
    }
}

pub(crate) fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_BODY_EXCERPT {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(MAX_BODY_EXCERPT).collect();
    cut.push_str("...");
    cut
}
