pub mod gemini;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use self::gemini::GeminiChatClient;
use super::LlmConfig;
use crate::models::chat::Message;

#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub system_instruction: &'a str,
    /// Context turns, oldest first. The last entry is the new user turn.
    pub messages: &'a [Message],
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("chat provider credential is not configured")]
    NotConfigured,
    #[error("upstream returned {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
    },
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Transport(err.without_url().to_string())
        }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        request: CompletionRequest<'_>
    ) -> Result<CompletionResponse, LlmError>;

    fn get_model(&self) -> String;

    fn is_configured(&self) -> bool;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client = GeminiChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
