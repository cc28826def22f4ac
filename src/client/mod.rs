use futures::future::{ AbortHandle, Abortable };
use log::{ debug, info, warn };
use reqwest::Client;
use serde::Deserialize;
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use thiserror::Error;

use crate::fallback::FallbackResponder;
use crate::history::{ ConversationHistory, HISTORY_WINDOW };
use crate::models::chat::{ ChatMode, ChatRequest, ChatResponse, Message, MessageError };

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("proxy returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },
    #[error("malformed reply: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("invalid reply: {0}")]
    InvalidReply(MessageError),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
    details: Option<serde_json::Value>,
}

/// HTTP client for the proxy's `/api/chat` endpoint. Holds no provider
/// credential.
#[derive(Clone)]
pub struct ProxyClient {
    http: Client,
    chat_url: String,
    timeout: Duration,
}

impl ProxyClient {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, ProxyError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ProxyError::Network(e.to_string()))?;
        Ok(Self {
            http,
            chat_url: format!("{}/api/chat", server_url.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends the trailing window of `messages` and returns the assistant turn.
    /// The whole exchange, body included, is bounded by the client timeout;
    /// when it expires the request future is dropped.
    pub async fn send(&self, messages: &[Message], mode: ChatMode) -> Result<Message, ProxyError> {
        let start = messages.len().saturating_sub(HISTORY_WINDOW);
        let request = ChatRequest {
            messages: messages[start..].to_vec(),
            mode,
        };

        tokio::time
            ::timeout(self.timeout, self.exchange(&request)).await
            .map_err(|_| ProxyError::Timeout(self.timeout))?
    }

    async fn exchange(&self, request: &ChatRequest) -> Result<Message, ProxyError> {
        let resp = self.http
            .post(&self.chat_url)
            .json(request)
            .send().await
            .map_err(|e| ProxyError::Network(e.without_url().to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ProxyError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json
                ::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| {
                    let details = b.details.map(|d| match d {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    });
                    match (b.error.or(b.message), details) {
                        (Some(e), Some(d)) => Some(format!("{} ({})", e, d)),
                        (e, d) => e.or(d),
                    }
                })
                .unwrap_or_else(|| body.trim().to_string());
            return Err(ProxyError::Status { status: status.as_u16(), message });
        }

        let reply: ChatResponse = serde_json
            ::from_str(&body)
            .map_err(|e| ProxyError::Malformed(e.to_string()))?;
        Message::assistant(reply.message).map_err(|e| ProxyError::Malformed(e.to_string()))
    }
}

/// Aborts whichever request its session currently has in flight.
#[derive(Clone)]
pub struct CancelHandle {
    slot: Arc<Mutex<Option<AbortHandle>>>,
}

impl CancelHandle {
    /// Returns `true` if a pending request was cancelled.
    pub fn cancel(&self) -> bool {
        let pending = self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match pending {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The proxy answered.
    Replied(Message),
    /// The proxy failed; the reply came from the fallback responder.
    Fallback(Message),
    /// The user aborted; nothing was added to the history.
    Cancelled,
}

/// Client-side state of one chat screen: the conversation, the transport and
/// the fallback used when the transport fails. `send` takes `&mut self`, so a
/// session never has two requests in flight.
pub struct ChatSession {
    client: ProxyClient,
    fallback: FallbackResponder,
    history: ConversationHistory,
    mode: ChatMode,
    in_flight: Arc<Mutex<Option<AbortHandle>>>,
}

impl ChatSession {
    pub fn new(client: ProxyClient, fallback: FallbackResponder, mode: ChatMode) -> Self {
        Self {
            client,
            fallback,
            history: ConversationHistory::new(),
            mode,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle { slot: Arc::clone(&self.in_flight) }
    }

    /// Discards the conversation and switches persona, as when the chat
    /// screen is remounted.
    pub fn reset(&mut self, mode: ChatMode) {
        self.history.clear();
        self.mode = mode;
    }

    pub async fn send(&mut self, text: &str) -> Result<SendOutcome, SendError> {
        let user = Message::user(text.trim()).map_err(|_| SendError::EmptyMessage)?;

        let mut context = self.history.window(HISTORY_WINDOW.saturating_sub(1)).to_vec();
        context.push(user.clone());

        let (handle, registration) = AbortHandle::new_pair();
        *self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);

        let result = Abortable::new(self.client.send(&context, self.mode), registration).await;

        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let (outcome, reply) = match result {
            Err(_aborted) => {
                info!("Chat request cancelled by user");
                return Ok(SendOutcome::Cancelled);
            }
            Ok(Ok(reply)) => {
                debug!("Proxy replied with {} chars", reply.content().len());
                (SendOutcome::Replied(reply.clone()), reply)
            }
            Ok(Err(e)) => {
                warn!("Chat proxy failed ({}); answering from fallback", e);
                let text = self.fallback.respond(self.mode, user.content());
                let reply = Message::assistant(text).map_err(SendError::InvalidReply)?;
                (SendOutcome::Fallback(reply.clone()), reply)
            }
        };

        self.history.push_exchange(user, reply);
        Ok(outcome)
    }
}
