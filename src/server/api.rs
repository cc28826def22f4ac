use axum::{
    body::Bytes,
    extract::{ ConnectInfo, Request, State },
    http::{ header, HeaderValue, Method },
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
    routing::{ get, post },
    Json,
    Router,
};
use chrono::{ SecondsFormat, Utc };
use log::{ debug, error, info, warn };
use serde_json::{ json, Value as JsonValue };
use std::error::Error;
use std::net::{ IpAddr, Ipv4Addr, SocketAddr };
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{ AllowOrigin, Any, CorsLayer };
use uuid::Uuid;

use super::error::ApiError;
use super::rate_limit::ClientRateLimiter;
use crate::config::prompt::{ self, PromptConfig };
use crate::config::ServerConfig;
use crate::history::{ context_window, HISTORY_WINDOW };
use crate::llm::chat::{ new_client, ChatClient, CompletionRequest };
use crate::models::chat::{ ChatRequest, ChatResponse, Role };

/// Upper bound on turns accepted in one request body.
pub const MAX_REQUEST_MESSAGES: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub chat_client: Arc<dyn ChatClient>,
    pub prompts: Arc<PromptConfig>,
    pub rate_limiter: Arc<ClientRateLimiter>,
    pub cors_origins: Option<Vec<String>>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_client = new_client(&config.llm)?;
        let prompts = match &config.prompts_path {
            Some(path) => prompt::load_prompts(path)?,
            None => Arc::new(PromptConfig::default()),
        };
        let limit = NonZeroU32::new(config.rate_limit_per_minute).ok_or(
            "rate limit must be at least 1 request per minute"
        )?;

        Ok(Self {
            chat_client,
            prompts,
            rate_limiter: Arc::new(ClientRateLimiter::per_minute(limit)?),
            cors_origins: config.cors_origins.clone(),
        })
    }
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    match origins {
        Some(list) if !list.iter().any(|o| o.trim() == "*") => {
            let parsed: Vec<HeaderValue> = list
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o.trim()) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin: {}", o);
                        None
                    }
                })
                .collect();
            base.allow_origin(AllowOrigin::list(parsed))
        }
        _ => base.allow_origin(Any),
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.cors_origins.as_deref());

    let api = Router::new()
        .route("/api/chat", post(chat_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .layer(middleware::from_fn(log_request))
        .layer(cors)
        .with_state(state)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Peer address when the server was started with connect info; requests
/// without it (in-process callers) share the unspecified address.
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = client_ip(&request);
    match state.rate_limiter.check(ip) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            warn!("Rate limit exceeded for {} (retry in {}s)", ip, retry_after_secs);
            ApiError::RateLimited { retry_after_secs }.into_response()
        }
    }
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    info!(
        "{} {} → {} in {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(
        json!({
            "status": "ok",
            "timestamp": now_rfc3339(),
            "geminiConfigured": state.chat_client.is_configured(),
        })
    )
}

/// Parses and validates a chat body. Shape problems are reported before any
/// field-level problem so the caller gets the most useful message.
pub fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, ApiError> {
    let value: JsonValue = serde_json
        ::from_slice(body)
        .map_err(|e| ApiError::InvalidRequest(format!("body is not valid JSON: {}", e)))?;

    let messages = value
        .get("messages")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| ApiError::InvalidRequest("`messages` must be an array".to_string()))?;

    if messages.is_empty() {
        return Err(ApiError::InvalidRequest("`messages` must not be empty".to_string()));
    }
    if messages.len() > MAX_REQUEST_MESSAGES {
        return Err(
            ApiError::InvalidRequest(
                format!("`messages` must not exceed {} entries", MAX_REQUEST_MESSAGES)
            )
        );
    }

    let request: ChatRequest = serde_json
        ::from_value(value)
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    match request.messages.last() {
        Some(last) if last.role() == Role::User => Ok(request),
        _ => Err(ApiError::InvalidRequest("the last message must come from the user".to_string())),
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    body: Bytes
) -> Result<Json<ChatResponse>, ApiError> {
    let request_id = Uuid::new_v4();

    let request = parse_chat_request(&body).map_err(|e| {
        warn!("[{}] Rejected chat request: {}", request_id, e);
        e
    })?;

    if !state.chat_client.is_configured() {
        error!("[{}] GEMINI_API_KEY not found in configuration", request_id);
        return Err(ApiError::NotConfigured);
    }

    let context = context_window(&request.messages, HISTORY_WINDOW);
    let system_instruction = state.prompts.system_instruction(
        request.mode,
        Utc::now().date_naive()
    );
    info!(
        "[{}] Chat request: mode={} received={} context={} model={}",
        request_id,
        request.mode,
        request.messages.len(),
        context.len(),
        state.chat_client.get_model()
    );

    let completion = state.chat_client
        .complete(CompletionRequest {
            system_instruction: &system_instruction,
            messages: context,
        }).await
        .map_err(|e| {
            error!("[{}] Upstream chat call failed: {}", request_id, e);
            ApiError::from(e)
        })?;

    debug!(
        "[{}] Reply ready: {} chars, {} tokens",
        request_id,
        completion.response.len(),
        completion.total_tokens.unwrap_or(0)
    );

    Ok(
        Json(ChatResponse {
            message: completion.response,
            timestamp: Some(now_rfc3339()),
        })
    )
}
