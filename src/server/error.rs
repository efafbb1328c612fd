use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::models::ErrorResponse;
use crate::error::OcrError;

#[derive(Debug)]
pub struct ServerError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ServerError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "client_input",
            message: message.into(),
        }
    }

    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            kind: "not_configured",
            message: message.into(),
        }
    }

    pub(crate) fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            kind: "upstream_failure",
            message: message.into(),
        }
    }
}

impl From<OcrError> for ServerError {
    fn from(err: OcrError) -> Self {
        let status = match &err {
            OcrError::ClientInput(_) => StatusCode::BAD_REQUEST,
            OcrError::UpstreamProtocol(_) | OcrError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            OcrError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            OcrError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                kind: self.kind.to_string(),
            }),
        )
            .into_response()
    }
}
