//! Chat model providers.
//!
//! Every backend streams assistant text through [`LlmProvider::stream_chat`]
//! and lists its models. The backend is picked from [`LlmConfig`] at startup;
//! nothing else in the crate depends on a concrete provider.

mod anthropic;
mod openai;
mod sse;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::{LlmBackend, LlmConfig};
use crate::error::LlmError;
use crate::sanitize::truncate_error_body;

pub use self::anthropic::AnthropicProvider;
pub use self::openai::OpenAiCompatibleProvider;
pub use self::sse::{SseDecoder, SseEvent, SseStep};

/// Stream of assistant text deltas.
pub type ChatStream = BoxStream<'static, Result<String, LlmError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Falls back to the provider's configured model when `None`.
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: None,
            messages,
            max_tokens: 1024,
        }
    }
}

/// A chat backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start a streamed completion. Errors before the first byte are
    /// returned directly; later failures arrive as stream items.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream, LlmError>;

    async fn list_models(&self) -> Result<Vec<String>, LlmError>;

    /// Drain a streamed completion into one string.
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let mut stream = self.stream_chat(request).await?;
        let mut text = String::new();
        while let Some(delta) = stream.next().await {
            text.push_str(&delta?);
        }
        Ok(text)
    }
}

/// Build the configured provider.
pub fn build_provider(config: &LlmConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    Ok(match config.backend {
        LlmBackend::OpenAiCompatible => Box::new(OpenAiCompatibleProvider::new(
            &config.base_url,
            config.api_key.clone(),
            config.model.clone(),
        )?),
        LlmBackend::Anthropic => Box::new(AnthropicProvider::new(
            &config.base_url,
            config.api_key.clone(),
            config.model.clone(),
        )?),
    })
}

/// Map a non-success status to the provider error taxonomy.
pub(crate) fn status_error(provider: &str, status: u16, body: &str) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthFailed {
            provider: provider.to_string(),
        },
        429 => LlmError::RateLimited {
            provider: provider.to_string(),
        },
        _ => LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: format!("HTTP {status}: {}", truncate_error_body(body)),
        },
    }
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> LlmError {
    LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn http_client() -> Result<reqwest::Client, LlmError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()?)
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

pub(crate) async fn read_model_list(
    provider: &str,
    response: reqwest::Response,
) -> Result<Vec<String>, LlmError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(provider, status.as_u16(), &body));
    }
    let list: ModelList = response
        .json()
        .await
        .map_err(|e| invalid_response(provider, e.to_string()))?;
    Ok(list.data.into_iter().map(|m| m.id).collect())
}
