//! Model provider seam: one `complete()` call against an OpenAI-compatible
//! chat-completions endpoint (OpenRouter by default).
//!
//! Failures are split into transient (retried by the backoff invoker) and
//! permanent (propagated immediately). HTTP 429 and 5xx are transient, as are
//! connect/timeout errors; 4xx and malformed responses are permanent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Truncation bound for provider error payloads carried in messages.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The endpoint asked us to slow down (429 or an equivalent body error).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network-level or server-side failure that is worth retrying.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Anything retrying will not fix: bad credentials, bad request,
    /// unparseable or empty response.
    #[error("permanent provider failure: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Transient(_))
    }
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// The external model-completion interface.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Identifier of the model this provider targets, for trace records.
    fn model_id(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

// ── OpenRouter wire types ───────────────────────────────────────────

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    /// Null when the provider refuses or fails upstream.
    #[serde(default)]
    content: Option<String>,
}

/// OpenRouter can return an error body under a 200 status when the upstream
/// provider failed; detect it so those get retried like any other 5xx.
#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    code: Option<i32>,
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Direct reqwest client for the OpenRouter chat-completions API.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenRouterProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelProvider for OpenRouterProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt.clone(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ProviderError::Transient(e.to_string())
                } else {
                    ProviderError::Permanent(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited(
                truncate(&text, MAX_ERROR_BODY).to_string(),
            ));
        }
        if status.is_server_error() {
            return Err(ProviderError::Transient(format!(
                "{status}: {}",
                truncate(&text, MAX_ERROR_BODY)
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::Permanent(format!(
                "{status}: {}",
                truncate(&text, MAX_ERROR_BODY)
            )));
        }

        // 200-with-error-body: classify by the embedded code.
        if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(&text) {
            let message = truncate(&envelope.error.message, MAX_ERROR_BODY).to_string();
            return Err(match envelope.error.code {
                Some(429) => ProviderError::RateLimited(message),
                Some(code) if code >= 500 => ProviderError::Transient(message),
                None => ProviderError::Transient(message),
                _ => ProviderError::Permanent(message),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Permanent(format!("unparseable response: {e}")))?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        if content.is_empty() {
            // Empty content usually means the upstream dropped the request.
            return Err(ProviderError::Transient("empty completion".into()));
        }

        Ok(content)
    }
}

/// Strip a surrounding markdown code fence from a model response.
///
/// Models regularly wrap full-file rewrites in ```python fences; the fence
/// header and trailing fence are removed, anything else is returned as-is.
pub fn strip_markdown_fences(content: &str) -> String {
    let trimmed = content.trim();
    let Some(without_open) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let after_header = match without_open.find('\n') {
        Some(idx) => &without_open[idx + 1..],
        None => without_open,
    };
    match after_header.rfind("```") {
        Some(end) => after_header[..end].trim().to_string(),
        None => trimmed.to_string(),
    }
}
