use async_trait::async_trait;
use log::{ debug, info, warn };
use reqwest::{ Client, StatusCode };
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::{ ChatClient, CompletionRequest, CompletionResponse, LlmError };
use crate::llm::LlmConfig;
use crate::models::chat::Role;

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_ERROR_DETAIL_LEN: usize = 500;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: &'a GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    usage_metadata: Option<GoogleUsage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCandidate {
    content: Option<GoogleContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleUsage {
    total_token_count: Option<u64>,
}

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    message: String,
}

fn provider_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Pulls the human-readable message out of a Google error envelope, falling
/// back to the raw body and then to the status reason.
fn upstream_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<GoogleErrorEnvelope>(body) {
        return envelope.error.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status.canonical_reason().unwrap_or("Unknown upstream error").to_string();
    }
    trimmed.chars().take(MAX_ERROR_DETAIL_LEN).collect()
}

fn extract_reply(body: &str) -> Result<CompletionResponse, LlmError> {
    let parsed: GoogleResponse = serde_json
        ::from_str(body)
        .map_err(|e| LlmError::Malformed(format!("invalid JSON: {}", e)))?;

    let candidate = parsed.candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Malformed("response has no candidates".to_string()))?;

    let text: String = candidate.content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        return Err(
            LlmError::Malformed(
                format!(
                    "candidate has no text (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                )
            )
        );
    }

    Ok(CompletionResponse {
        response: text,
        total_tokens: parsed.usage_metadata.and_then(|u| u.total_token_count),
    })
}

pub struct GeminiChatClient {
    http: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    generation_config: GenerationConfig,
}

impl GeminiChatClient {
    pub fn new(
        api_key: Option<String>,
        model: String,
        base_url: String,
        generation_config: GenerationConfig,
        timeout: Duration
    ) -> Result<Self, LlmError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url,
            generation_config,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let generation_config = GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            top_p: 0.9,
            top_k: 40,
        };
        Self::new(
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
            generation_config,
            config.timeout
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(
        &self,
        request: CompletionRequest<'_>
    ) -> Result<CompletionResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;

        let contents = request.messages
            .iter()
            .map(|m| GeminiContent {
                role: Some(provider_role(m.role())),
                parts: vec![GeminiPart { text: m.content() }],
            })
            .collect();

        let payload = GenerateContentRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: request.system_instruction }],
            },
            contents,
            generation_config: &self.generation_config,
        };

        info!(
            "GeminiChatClient::complete() → model={} turns={}",
            self.model,
            request.messages.len()
        );

        let resp = self.http
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&payload)
            .send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = upstream_error_message(status, &body);
            warn!("Gemini returned {}: {}", status.as_u16(), message);
            return Err(LlmError::Upstream { status: status.as_u16(), message });
        }

        let reply = extract_reply(&body)?;
        debug!(
            "Gemini reply: {} chars, {} tokens",
            reply.response.len(),
            reply.total_tokens.unwrap_or(0)
        );
        Ok(reply)
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_and_usage() {
        let body = r#"{
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello " }, { "text": "there" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "totalTokenCount": 12 }
        }"#;
        let reply = extract_reply(body).unwrap();
        assert_eq!(reply.response, "Hello there");
        assert_eq!(reply.total_tokens, Some(12));
    }

    #[test]
    fn empty_candidates_are_malformed() {
        assert!(matches!(extract_reply(r#"{"candidates":[]}"#), Err(LlmError::Malformed(_))));
        assert!(matches!(extract_reply("not json"), Err(LlmError::Malformed(_))));
        let blocked = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        match extract_reply(blocked) {
            Err(LlmError::Malformed(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("unexpected: {:?}", other.map(|r| r.response)),
        }
    }

    #[test]
    fn error_message_prefers_google_envelope() {
        let body = r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#;
        assert_eq!(
            upstream_error_message(StatusCode::SERVICE_UNAVAILABLE, body),
            "The model is overloaded."
        );
        assert_eq!(
            upstream_error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
        assert_eq!(upstream_error_message(StatusCode::BAD_GATEWAY, "oops"), "oops");
    }

    #[test]
    fn assistant_turns_map_to_model_role() {
        assert_eq!(provider_role(Role::Assistant), "model");
        assert_eq!(provider_role(Role::User), "user");
    }
}
