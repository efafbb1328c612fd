use axum::Json;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use std::sync::Arc;

use super::error::ServerError;
use super::models::{OcrJsonRequest, OcrResponse};
use super::state::ServerState;
use super::util::decode_image_base64;
use crate::pipeline::OcrRequest;

const IMAGE_FIELD: &str = "image";
const LANG_FIELD: &str = "lang";

pub(crate) async fn ocr_request(
    state: &Arc<ServerState>,
    request: Request,
) -> Result<OcrResponse, ServerError> {
    let request = read_ocr_request(state, request).await?;
    let cancel = state.shutdown.child_token();
    let outcome = state.pipeline.run(request, &cancel).await?;
    Ok(OcrResponse::from(&outcome))
}

async fn read_ocr_request(
    state: &Arc<ServerState>,
    request: Request,
) -> Result<OcrRequest, ServerError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|err| ServerError::bad_request(err.body_text()))?;
        return read_multipart(multipart).await;
    }
    if content_type.starts_with("application/json") {
        let Json(payload) = Json::<OcrJsonRequest>::from_request(request, state)
            .await
            .map_err(|err| ServerError::bad_request(err.body_text()))?;
        return from_json(payload);
    }
    Err(ServerError::bad_request(
        "expected multipart/form-data or application/json",
    ))
}

async fn read_multipart(mut multipart: Multipart) -> Result<OcrRequest, ServerError> {
    let mut request = OcrRequest::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServerError::bad_request(format!("invalid multipart body: {}", err)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(IMAGE_FIELD) => {
                request.mime = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|err| {
                    ServerError::bad_request(format!("failed to read image field: {}", err))
                })?;
                request.image = Some(bytes.to_vec());
            }
            Some(LANG_FIELD) => {
                let lang = field.text().await.map_err(|err| {
                    ServerError::bad_request(format!("failed to read lang field: {}", err))
                })?;
                request.lang = Some(lang);
            }
            _ => {}
        }
    }
    Ok(request)
}

fn from_json(payload: OcrJsonRequest) -> Result<OcrRequest, ServerError> {
    let (image, embedded_mime) = match payload.image_base64.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            let (bytes, mime) = decode_image_base64(raw)?;
            (Some(bytes), mime)
        }
        _ => (None, None),
    };
    Ok(OcrRequest {
        image,
        mime: payload.image_mime.or(embedded_mime),
        lang: payload.lang,
    })
}
