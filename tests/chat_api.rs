use axum::extract::State;
use axum::http::{ header, HeaderMap, Request, StatusCode };
use axum::routing::post;
use axum::{ Json, Router };
use lumi_chat::config::ServerConfig;
use lumi_chat::llm::LlmConfig;
use lumi_chat::server::api::{ build_router, AppState };
use serde_json::{ json, Value };
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot`

const TEST_KEY: &str = "AIza-test-secret-key";

#[derive(Clone)]
struct MockGemini {
    status: StatusCode,
    body: String,
    delay: Duration,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn generate(
    State(mock): State<MockGemini>,
    headers: HeaderMap,
    Json(payload): Json<Value>
) -> (StatusCode, String) {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    mock.seen.lock().unwrap().push((key, payload));
    tokio::time::sleep(mock.delay).await;
    (mock.status, mock.body.clone())
}

/// Starts a fake generateContent endpoint and returns its base URL.
async fn spawn_gemini(status: StatusCode, body: Value) -> (String, MockGemini) {
    spawn_slow_gemini(status, body, Duration::ZERO).await
}

async fn spawn_slow_gemini(status: StatusCode, body: Value, delay: Duration) -> (String, MockGemini) {
    let mock = MockGemini {
        status,
        body: body.to_string(),
        delay,
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/v1beta/models/{call}", post(generate))
        .with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), mock)
}

fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }],
        "usageMetadata": { "totalTokenCount": 12 }
    })
}

fn config_for(base_url: &str, api_key: Option<&str>, timeout: Duration) -> ServerConfig {
    ServerConfig {
        llm: LlmConfig {
            api_key: api_key.map(str::to_string),
            base_url: base_url.to_string(),
            timeout,
            ..LlmConfig::default()
        },
        ..ServerConfig::default()
    }
}

fn router_for(base_url: &str, api_key: Option<&str>) -> Router {
    build_router(AppState::new(&config_for(base_url, api_key, Duration::from_secs(5))).unwrap())
}

async fn post_chat(app: Router, body: Value) -> (StatusCode, HeaderMap, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(body.to_string()))
                .unwrap()
        ).await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}

fn hello() -> Value {
    json!({ "messages": [{ "role": "user", "content": "hello" }] })
}

#[tokio::test]
async fn proxies_reply_from_gemini() {
    let (base, mock) = spawn_gemini(StatusCode::OK, gemini_reply("Hi there! How can I help?")).await;
    let (status, _, body) = post_chat(router_for(&base, Some(TEST_KEY)), hello()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hi there! How can I help?");
    assert!(body["timestamp"].as_str().is_some());

    let seen = mock.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some(TEST_KEY));
    let payload = &seen[0].1;
    assert_eq!(payload["contents"][0]["role"], "user");
    assert_eq!(payload["contents"][0]["parts"][0]["text"], "hello");
    assert!(payload["systemInstruction"]["parts"][0]["text"].as_str().unwrap().contains("LumiChat"));
    assert_eq!(payload["generationConfig"]["maxOutputTokens"], 400);
}

#[tokio::test]
async fn rejects_empty_messages_without_calling_upstream() {
    let (base, mock) = spawn_gemini(StatusCode::OK, gemini_reply("unused")).await;
    let (status, _, body) = post_chat(router_for(&base, Some(TEST_KEY)), json!({ "messages": [] })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request format");
    assert!(mock.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_key_reports_hint() {
    let (status, _, body) = post_chat(router_for("http://127.0.0.1:9", None), hello()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "GEMINI_API_KEY not configured");
    assert_eq!(body["hint"], "Add GEMINI_API_KEY to your .env file");
}

#[tokio::test]
async fn upstream_error_status_is_passed_through() {
    let (base, _) = spawn_gemini(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": { "code": 503, "message": "The model is overloaded", "status": "UNAVAILABLE" } })
    ).await;
    let (status, _, body) = post_chat(router_for(&base, Some(TEST_KEY)), hello()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Upstream service error");
    assert!(body["details"].as_str().unwrap().contains("overloaded"));
    assert!(!body.to_string().contains(TEST_KEY));
}

#[tokio::test]
async fn malformed_upstream_reply_is_500() {
    let (base, _) = spawn_gemini(StatusCode::OK, json!({ "candidates": [] })).await;
    let (status, _, body) = post_chat(router_for(&base, Some(TEST_KEY)), hello()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Malformed response from upstream service");
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (status, _, body) = post_chat(router_for(&format!("http://{}", addr), Some(TEST_KEY)), hello()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body.to_string().contains(TEST_KEY));
}

#[tokio::test]
async fn eleventh_request_in_a_minute_is_limited() {
    let (base, _) = spawn_gemini(StatusCode::OK, gemini_reply("ok")).await;
    let app = router_for(&base, Some(TEST_KEY));

    for i in 0..10 {
        let (status, _, _) = post_chat(app.clone(), hello()).await;
        assert_eq!(status, StatusCode::OK, "request {} should pass", i + 1);
    }

    let (status, headers, body) = post_chat(app.clone(), hello()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["message"], "Too many requests, please try again later.");
    assert!(headers.contains_key(header::RETRY_AFTER));
    assert!(body["retryAfter"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn diary_mode_sends_diary_persona_and_trailing_window() {
    let (base, mock) = spawn_gemini(StatusCode::OK, gemini_reply("I'm listening.")).await;

    let mut messages = Vec::new();
    for i in 0..4 {
        messages.push(json!({ "role": "user", "content": format!("entry {}", i) }));
        messages.push(json!({ "role": "assistant", "content": format!("reply {}", i) }));
    }
    messages.push(json!({ "role": "user", "content": "today was heavy" }));

    let (status, _, body) = post_chat(
        router_for(&base, Some(TEST_KEY)),
        json!({ "messages": messages, "mode": "diary" })
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "I'm listening.");

    let seen = mock.seen.lock().unwrap();
    let payload = &seen[0].1;
    let system = payload["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
    assert!(system.contains("mood diary"));
    assert!(!system.contains("{current_date}"));

    let contents = payload["contents"].as_array().unwrap();
    assert!(contents.len() <= 6);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents.last().unwrap()["parts"][0]["text"], "today was heavy");
    assert_eq!(contents[contents.len() - 2]["role"], "model");
}

#[tokio::test]
async fn slow_upstream_is_gateway_timeout() {
    let (base, _) = spawn_slow_gemini(
        StatusCode::OK,
        gemini_reply("too late"),
        Duration::from_secs(3)
    ).await;
    let config = config_for(&base, Some(TEST_KEY), Duration::from_millis(200));
    let app = build_router(AppState::new(&config).unwrap());

    let (status, _, body) = post_chat(app, hello()).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body["error"].as_str().is_some());
    assert!(body["details"].as_str().is_some());
    assert!(!body.to_string().contains(TEST_KEY));
}

#[tokio::test]
async fn invalid_body_is_400_even_without_key() {
    let (status, _, body) = post_chat(
        router_for("http://127.0.0.1:9", None),
        json!({ "messages": [] })
    ).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request format");
    assert!(body.get("hint").is_none());
}

async fn preflight(app: Router, origin: &str) -> HeaderMap {
    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/chat")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(axum::body::Body::empty())
                .unwrap()
        ).await
        .unwrap();
    response.headers().clone()
}

#[tokio::test]
async fn cors_origin_list_is_enforced() {
    let config = ServerConfig {
        cors_origins: Some(vec!["http://localhost:5173".to_string()]),
        ..config_for("http://127.0.0.1:9", Some(TEST_KEY), Duration::from_secs(5))
    };
    let app = build_router(AppState::new(&config).unwrap());

    let allowed = preflight(app.clone(), "http://localhost:5173").await;
    assert_eq!(
        allowed.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );

    let denied = preflight(app, "http://evil.example").await;
    assert!(denied.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn cors_defaults_to_any_origin() {
    let headers = preflight(router_for("http://127.0.0.1:9", Some(TEST_KEY)), "http://anywhere.example").await;
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
