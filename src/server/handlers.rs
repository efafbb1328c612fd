use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::error::ServerError;
use super::models::{ChatRequest, ImageRequest, OcrResponse};
use super::ocr::ocr_request;
use super::state::ServerState;
use crate::providers::{ChatReply, GeneratedImage, validate_messages};
use crate::settings;

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let state = Arc::new(ServerState::from_settings(settings)?);
    let shutdown = state.shutdown_token();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address: {}", addr))?;
    info!("listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {}", err);
                return;
            }
            info!("shutting down; cancelling in-flight OCR jobs");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}

pub fn router(state: Arc<ServerState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/ocr", post(ocr))
        .route("/chat", post(chat))
        .route("/image", post(image))
        .layer(DefaultBodyLimit::max(state.settings.server_max_upload_bytes));
    if let Some(dir) = state.settings.server_static_dir.as_deref() {
        app = app.fallback_service(ServeDir::new(dir));
    }
    app.with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

async fn ocr(
    State(state): State<Arc<ServerState>>,
    request: Request,
) -> Result<Json<OcrResponse>, ServerError> {
    match ocr_request(&state, request).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            warn!("OCR request failed ({}): {}", err.kind, err.message);
            Err(err)
        }
    }
}

async fn chat(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ServerError> {
    validate_messages(&payload.messages)
        .map_err(|err| ServerError::bad_request(err.to_string()))?;
    if !state.openai.is_configured() {
        return Err(ServerError::unavailable("OPENAI_API_KEY is not configured"));
    }
    let reply = state
        .openai
        .chat(&payload.messages, payload.model.as_deref())
        .await
        .map_err(|err| {
            warn!("chat request failed: {:#}", err);
            ServerError::bad_gateway(format!("{:#}", err))
        })?;
    Ok(Json(reply))
}

async fn image(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<ImageRequest>,
) -> Result<Json<GeneratedImage>, ServerError> {
    if payload.prompt.trim().is_empty() {
        return Err(ServerError::bad_request("prompt is required"));
    }
    if !state.openai.is_configured() {
        return Err(ServerError::unavailable("OPENAI_API_KEY is not configured"));
    }
    let image = state
        .openai
        .generate_image(&payload.prompt, payload.size.as_deref())
        .await
        .map_err(|err| {
            warn!("image generation failed: {:#}", err);
            ServerError::bad_gateway(format!("{:#}", err))
        })?;
    Ok(Json(image))
}
