use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use vision_relay::server::{ErrorResponse, OcrResponse, ServerState, router};
use vision_relay::settings::Settings;

const VISION_KEY: &str = "vision-key";
const TRANSLATOR_KEY: &str = "translator-key";
const IMAGE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];

#[derive(Default)]
struct Upstream {
    base: Mutex<String>,
    script: Mutex<VecDeque<Value>>,
    omit_handle: bool,
    translation_fails: bool,
    poll_fails: bool,
    submits: AtomicUsize,
    polls: AtomicUsize,
    translations: AtomicUsize,
    submitted_type: Mutex<Option<String>>,
}

impl Upstream {
    fn with_script(script: Vec<Value>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn succeeded(pages: &[&[&str]]) -> Value {
    let read_results = pages
        .iter()
        .enumerate()
        .map(|(index, lines)| {
            let lines = lines
                .iter()
                .map(|text| json!({ "text": text, "boundingBox": [0, 0, 1, 1] }))
                .collect::<Vec<_>>();
            json!({ "page": index + 1, "lines": lines })
        })
        .collect::<Vec<_>>();
    json!({ "status": "succeeded", "analyzeResult": { "readResults": read_results } })
}

fn running() -> Value {
    json!({ "status": "running" })
}

async fn analyze(
    State(upstream): State<Arc<Upstream>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    upstream.submits.fetch_add(1, Ordering::SeqCst);
    if headers
        .get("ocp-apim-subscription-key")
        .and_then(|value| value.to_str().ok())
        != Some(VISION_KEY)
    {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    assert!(!body.is_empty());
    *upstream.submitted_type.lock().unwrap() = headers
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    if upstream.omit_handle {
        return StatusCode::ACCEPTED.into_response();
    }
    let location = format!(
        "{}/vision/v3.2/read/analyzeResults/job-1",
        upstream.base.lock().unwrap()
    );
    (StatusCode::ACCEPTED, [("operation-location", location)]).into_response()
}

async fn analyze_result(State(upstream): State<Arc<Upstream>>) -> Response {
    upstream.polls.fetch_add(1, Ordering::SeqCst);
    if upstream.poll_fails {
        return (StatusCode::INTERNAL_SERVER_ERROR, "poll exploded").into_response();
    }
    let next = upstream.script.lock().unwrap().pop_front();
    Json(next.unwrap_or_else(running)).into_response()
}

async fn chat_completions(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        != Some("Bearer openai-key")
    {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    let last = body["messages"]
        .as_array()
        .and_then(|messages| messages.last())
        .and_then(|message| message["content"].as_str())
        .unwrap_or_default()
        .to_string();
    let message = json!({ "role": "assistant", "content": format!("echo: {}", last) });
    Json(json!({ "model": body["model"], "choices": [{ "message": message }] }))
    .into_response()
}

async fn images_generations(Json(body): Json<Value>) -> Json<Value> {
    let size = body["size"].as_str().unwrap_or_default();
    Json(json!({
        "data": [{
            "url": format!("https://images.test/{}.png", size),
            "revised_prompt": body["prompt"],
        }]
    }))
}

async fn translate(
    State(upstream): State<Arc<Upstream>>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    upstream.translations.fetch_add(1, Ordering::SeqCst);
    if upstream.translation_fails {
        return (StatusCode::INTERNAL_SERVER_ERROR, "translator exploded").into_response();
    }
    let to = params.get("to").cloned().unwrap_or_default();
    let text = body[0]["Text"].as_str().unwrap_or_default().to_string();
    Json(json!([{ "translations": [{ "text": format!("{}:{}", to, text), "to": to }] }]))
        .into_response()
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{}", addr)
}

async fn spawn_upstream(upstream: Upstream) -> (Arc<Upstream>, String) {
    let upstream = Arc::new(upstream);
    let app = Router::new()
        .route("/vision/v3.2/read/analyze", post(analyze))
        .route("/vision/v3.2/read/analyzeResults/:id", get(analyze_result))
        .route("/translate", post(translate))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/images/generations", post(images_generations))
        .with_state(upstream.clone());
    let base = spawn(app).await;
    *upstream.base.lock().unwrap() = base.clone();
    (upstream, base)
}

fn relay_settings(upstream_base: &str, max_attempts: u32) -> Settings {
    let mut settings = Settings::default();
    settings.ocr_endpoint = upstream_base.to_string();
    settings.ocr_key = Some(VISION_KEY.to_string());
    settings.ocr_poll_interval = Duration::from_millis(10);
    settings.ocr_max_attempts = max_attempts;
    settings.translator_endpoint = upstream_base.to_string();
    settings.translator_key = Some(TRANSLATOR_KEY.to_string());
    settings
}

async fn spawn_relay(settings: Settings) -> String {
    let state = ServerState::from_settings(settings).expect("state");
    spawn(router(Arc::new(state))).await
}

async fn post_json(relay: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/ocr", relay))
        .json(&body)
        .send()
        .await
        .expect("relay response")
}

fn image_body(lang: Option<&str>) -> Value {
    let mut body = json!({ "image_base64": BASE64.encode(IMAGE) });
    if let Some(lang) = lang {
        body["lang"] = json!(lang);
    }
    body
}

#[tokio::test]
async fn json_upload_runs_submit_poll_translate() {
    let (upstream, base) = spawn_upstream(Upstream::with_script(vec![
        running(),
        succeeded(&[&["a", "b"], &["c"]]),
    ]))
    .await;
    let relay = spawn_relay(relay_settings(&base, 10)).await;

    let response = post_json(&relay, image_body(Some("de"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: OcrResponse = response.json().await.expect("json");
    assert_eq!(
        body,
        OcrResponse {
            extracted_text: "a\nb\nc".to_string(),
            translated_text: "de:a\nb\nc".to_string(),
            target_language: "de".to_string(),
        }
    );
    assert_eq!(Upstream::count(&upstream.submits), 1);
    assert_eq!(Upstream::count(&upstream.polls), 2);
    assert_eq!(Upstream::count(&upstream.translations), 1);
    assert_eq!(
        upstream.submitted_type.lock().unwrap().as_deref(),
        Some("image/png")
    );
}

#[tokio::test]
async fn multipart_upload_defaults_language() {
    let (upstream, base) =
        spawn_upstream(Upstream::with_script(vec![succeeded(&[&["hallo welt"]])])).await;
    let relay = spawn_relay(relay_settings(&base, 10)).await;

    let boundary = "relay-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            concat!(
                "--{b}\r\n",
                "Content-Disposition: form-data; name=\"image\"; filename=\"scan.png\"\r\n",
                "Content-Type: application/octet-stream\r\n\r\n",
            ),
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(IMAGE);
    body.extend_from_slice(format!("\r\n--{b}--\r\n", b = boundary).as_bytes());

    let response = reqwest::Client::new()
        .post(format!("{}/ocr", relay))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(body)
        .send()
        .await
        .expect("relay response");
    assert_eq!(response.status(), StatusCode::OK);
    let body: OcrResponse = response.json().await.expect("json");
    assert_eq!(body.extracted_text, "hallo welt");
    assert_eq!(body.translated_text, "en:hallo welt");
    assert_eq!(body.target_language, "en");
    assert_eq!(Upstream::count(&upstream.polls), 1);
    assert_eq!(
        upstream.submitted_type.lock().unwrap().as_deref(),
        Some("image/png")
    );
}

#[tokio::test]
async fn missing_image_is_rejected_without_upstream_calls() {
    let (upstream, base) = spawn_upstream(Upstream::default()).await;
    let relay = spawn_relay(relay_settings(&base, 10)).await;

    let response = post_json(&relay, json!({ "lang": "de" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.expect("json");
    assert_eq!(body.kind, "client_input");
    assert_eq!(Upstream::count(&upstream.submits), 0);
    assert_eq!(Upstream::count(&upstream.polls), 0);
}

#[tokio::test]
async fn failed_job_stops_polling() {
    let (upstream, base) = spawn_upstream(Upstream::with_script(vec![
        json!({ "status": "failed" }),
        succeeded(&[&["never"]]),
    ]))
    .await;
    let relay = spawn_relay(relay_settings(&base, 10)).await;

    let response = post_json(&relay, image_body(None)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: ErrorResponse = response.json().await.expect("json");
    assert_eq!(body.kind, "upstream_failure");
    assert_eq!(Upstream::count(&upstream.polls), 1);
    assert_eq!(Upstream::count(&upstream.translations), 0);
}

#[tokio::test]
async fn poll_http_error_is_fatal() {
    let (upstream, base) = spawn_upstream(Upstream {
        poll_fails: true,
        ..Upstream::with_script(vec![succeeded(&[&["never"]])])
    })
    .await;
    let relay = spawn_relay(relay_settings(&base, 10)).await;

    let response = post_json(&relay, image_body(None)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: ErrorResponse = response.json().await.expect("json");
    assert_eq!(body.kind, "upstream_failure");
    assert!(body.error.contains("500"), "{}", body.error);
    assert_eq!(Upstream::count(&upstream.polls), 1);
    assert_eq!(Upstream::count(&upstream.translations), 0);
}

#[tokio::test]
async fn exhausted_budget_reports_timeout() {
    let (upstream, base) = spawn_upstream(Upstream::default()).await;
    let relay = spawn_relay(relay_settings(&base, 3)).await;

    let response = post_json(&relay, image_body(None)).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: ErrorResponse = response.json().await.expect("json");
    assert_eq!(body.kind, "timeout");
    assert_eq!(Upstream::count(&upstream.polls), 3);
}

#[tokio::test]
async fn accepted_without_handle_is_a_protocol_error() {
    let (upstream, base) = spawn_upstream(Upstream {
        omit_handle: true,
        ..Upstream::default()
    })
    .await;
    let relay = spawn_relay(relay_settings(&base, 10)).await;

    let response = post_json(&relay, image_body(None)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: ErrorResponse = response.json().await.expect("json");
    assert_eq!(body.kind, "upstream_protocol");
    assert_eq!(Upstream::count(&upstream.polls), 0);
}

#[tokio::test]
async fn rejected_submission_carries_upstream_status() {
    let (_upstream, base) = spawn_upstream(Upstream::default()).await;
    let mut settings = relay_settings(&base, 10);
    settings.ocr_key = Some("wrong-key".to_string());
    let relay = spawn_relay(settings).await;

    let response = post_json(&relay, image_body(None)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: ErrorResponse = response.json().await.expect("json");
    assert_eq!(body.kind, "upstream_failure");
    assert!(body.error.contains("401"), "{}", body.error);
    assert!(!body.error.contains("wrong-key"));
}

#[tokio::test]
async fn translation_failure_degrades_to_marker() {
    let (upstream, base) = spawn_upstream(Upstream {
        translation_fails: true,
        ..Upstream::with_script(vec![succeeded(&[&["bonjour"]])])
    })
    .await;
    let relay = spawn_relay(relay_settings(&base, 10)).await;

    let response = post_json(&relay, image_body(Some("en"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: OcrResponse = response.json().await.expect("json");
    assert_eq!(body.extracted_text, "bonjour");
    assert_eq!(body.translated_text, "Translation unavailable");
    assert_eq!(Upstream::count(&upstream.translations), 1);
}

#[tokio::test]
async fn empty_result_skips_translation() {
    let (upstream, base) =
        spawn_upstream(Upstream::with_script(vec![json!({ "status": "succeeded" })])).await;
    let relay = spawn_relay(relay_settings(&base, 10)).await;

    let response = post_json(&relay, image_body(None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: OcrResponse = response.json().await.expect("json");
    assert_eq!(body.extracted_text, "No text found");
    assert_eq!(body.translated_text, "No text to translate");
    assert_eq!(Upstream::count(&upstream.translations), 0);
}

#[tokio::test]
async fn shutdown_cancels_in_flight_polling() {
    let (upstream, base) = spawn_upstream(Upstream::default()).await;
    let state = ServerState::from_settings(relay_settings(&base, 10_000)).expect("state");
    let shutdown = state.shutdown_token();
    let relay = spawn(router(Arc::new(state))).await;

    let pending = tokio::spawn(async move { post_json(&relay, image_body(None)).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();

    let response = pending.await.expect("join");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: ErrorResponse = response.json().await.expect("json");
    assert_eq!(body.kind, "cancelled");

    let polls = Upstream::count(&upstream.polls);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(Upstream::count(&upstream.polls), polls);
}

#[tokio::test]
async fn health_and_cors() {
    let relay = spawn_relay(Settings::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", relay))
        .send()
        .await
        .expect("health");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );

    let preflight = client
        .request(reqwest::Method::OPTIONS, format!("{}/ocr", relay))
        .send()
        .await
        .expect("preflight");
    assert_eq!(preflight.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn chat_and_image_need_an_api_key() {
    let relay = spawn_relay(Settings::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/chat", relay))
        .json(&json!({ "messages": [{ "role": "user", "content": "hi" }] }))
        .send()
        .await
        .expect("chat");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = client
        .post(format!("{}/chat", relay))
        .json(&json!({ "messages": [] }))
        .send()
        .await
        .expect("chat");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/image", relay))
        .json(&json!({ "prompt": "  " }))
        .send()
        .await
        .expect("image");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn openai_settings(upstream_base: &str) -> Settings {
    let mut settings = Settings::default();
    settings.openai_base_url = format!("{}/v1", upstream_base);
    settings.openai_key = Some("openai-key".to_string());
    settings
}

#[tokio::test]
async fn chat_relays_completion() {
    let (_upstream, base) = spawn_upstream(Upstream::default()).await;
    let relay = spawn_relay(openai_settings(&base)).await;

    let response = reqwest::Client::new()
        .post(format!("{}/chat", relay))
        .json(&json!({
            "messages": [
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": "hi" }
            ]
        }))
        .send()
        .await
        .expect("chat");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["reply"], "echo: hi");
    assert_eq!(body["model"], "gpt-4o-mini");
}

#[tokio::test]
async fn image_relays_generation() {
    let (_upstream, base) = spawn_upstream(Upstream::default()).await;
    let relay = spawn_relay(openai_settings(&base)).await;

    let response = reqwest::Client::new()
        .post(format!("{}/image", relay))
        .json(&json!({ "prompt": "a lighthouse", "size": "512x512" }))
        .send()
        .await
        .expect("image");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["url"], "https://images.test/512x512.png");
    assert_eq!(body["revised_prompt"], "a lighthouse");
    assert!(body.get("b64_json").is_none());
}
