//! Chat-completion client for the Anthropic Messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::session_manager::Turn;
use crate::error::{RelayError, RelayResult};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful voice assistant connected to Google Home. \
    Keep responses concise and conversational - they will be spoken aloud. \
    Aim for 1-3 sentences unless more detail is specifically requested.";

const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Anything that can turn a transcript into the next assistant reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn reply(&self, history: &[Turn]) -> RelayResult<String>;
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

pub struct AnthropicClient {
    client: reqwest::Client,
    settings: LlmSettings,
}

impl AnthropicClient {
    pub fn new(settings: LlmSettings) -> RelayResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        if let Some(key) = &settings.api_key {
            let value = HeaderValue::from_str(key).map_err(|_| {
                RelayError::Internal("ANTHROPIC_API_KEY is not a valid header value".into())
            })?;
            headers.insert("x-api-key", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    fn build_request<'a>(&'a self, history: &'a [Turn]) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            system: &self.settings.system_prompt,
            messages: history,
        }
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn reply(&self, history: &[Turn]) -> RelayResult<String> {
        if self.settings.api_key.is_none() {
            return Err(RelayError::remote("ANTHROPIC_API_KEY is not set"));
        }

        let url = format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'));
        debug!(model = %self.settings.model, turns = history.len(), "calling messages API");

        let response = self
            .client
            .post(&url)
            .json(&self.build_request(history))
            .send()
            .await
            .map_err(|e| RelayError::remote(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::remote(upstream_error_message(status.as_u16(), &body)));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| RelayError::remote(format!("failed to parse response: {e}")))?;

        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or_else(|| RelayError::remote("response contained no text"))
    }
}

fn upstream_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!("{status} {}: {}", envelope.error.kind, envelope.error.message),
        Err(_) if body.trim().is_empty() => format!("{status} upstream error"),
        Err(_) => format!("{status} {}", body.trim()),
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Turn],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}
