use axum::http::{ header, HeaderValue, StatusCode };
use axum::response::{ IntoResponse, Response };
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::llm::chat::LlmError;

pub const INVALID_REQUEST: &str = "Invalid request format";
pub const NOT_CONFIGURED: &str = "GEMINI_API_KEY not configured";
pub const NOT_CONFIGURED_HINT: &str = "Add GEMINI_API_KEY to your .env file";
pub const RATE_LIMITED: &str = "Too many requests, please try again later.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("chat provider credential is not configured")]
    NotConfigured,
    #[error("upstream returned {status}: {details}")]
    Upstream {
        status: u16,
        details: String,
    },
    #[error("upstream unreachable: {0}")]
    UpstreamUnavailable(String),
    #[error("upstream timed out")]
    UpstreamTimeout,
    #[error("malformed upstream response: {0}")]
    MalformedUpstream(String),
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        retry_after_secs: u64,
    },
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured => ApiError::NotConfigured,
            LlmError::Upstream { status, message } => ApiError::Upstream { status, details: message },
            LlmError::Timeout => ApiError::UpstreamTimeout,
            LlmError::Transport(msg) => ApiError::UpstreamUnavailable(msg),
            LlmError::Malformed(msg) => ApiError::MalformedUpstream(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidRequest(details) =>
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": INVALID_REQUEST, "details": details })),
                ).into_response(),
            ApiError::NotConfigured =>
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": NOT_CONFIGURED, "hint": NOT_CONFIGURED_HINT })),
                ).into_response(),
            ApiError::Upstream { status, details } => {
                let code = StatusCode::from_u16(status)
                    .ok()
                    .filter(|c| c.is_client_error() || c.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    code,
                    Json(json!({ "error": "Upstream service error", "details": details })),
                ).into_response()
            }
            ApiError::UpstreamUnavailable(details) =>
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "Upstream service unreachable", "details": details })),
                ).into_response(),
            ApiError::UpstreamTimeout =>
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    Json(
                        json!({ "error": "Upstream service timed out", "details": "No reply before the deadline" })
                    ),
                ).into_response(),
            // Details stay in the log; the client only learns that the reply was unusable.
            ApiError::MalformedUpstream(_) =>
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Malformed response from upstream service" })),
                ).into_response(),
            ApiError::RateLimited { retry_after_secs } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "message": RATE_LIMITED, "retryAfter": retry_after_secs })),
                ).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
        }
    }
}
