use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;

use super::sse::{SseEvent, SseStep, text_stream};
use super::{
    ChatRequest, ChatStream, LlmProvider, Role, http_client, invalid_response, read_model_list,
    status_error,
};
use crate::error::LlmError;

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Anthropic Messages API backend.
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

impl AnthropicProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        model: Option<String>,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header("anthropic-version", API_VERSION);
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key.expose_secret()),
            None => builder,
        }
    }
}

/// System messages travel in a top-level field, not in the turn list.
fn split_system(request: &ChatRequest) -> (Option<String>, Vec<WireMessage<'_>>) {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let turns = request
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| WireMessage {
            role: m.role,
            content: &m.content,
        })
        .collect();
    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, turns)
}

pub(crate) fn extract_delta(event: &SseEvent) -> Result<SseStep, LlmError> {
    match event.event.as_deref() {
        Some("message_stop") => return Ok(SseStep::Done),
        Some("ping") => return Ok(SseStep::Skip),
        _ => {}
    }
    if event.data.trim().is_empty() {
        return Ok(SseStep::Skip);
    }
    let value: Value = serde_json::from_str(&event.data)
        .map_err(|e| invalid_response(PROVIDER, format!("bad stream event: {e}")))?;
    match value.get("type").and_then(Value::as_str) {
        Some("content_block_delta") => Ok(value
            .pointer("/delta/text")
            .and_then(Value::as_str)
            .map(|text| SseStep::Text(text.to_string()))
            .unwrap_or(SseStep::Skip)),
        Some("message_stop") => Ok(SseStep::Done),
        Some("error") => {
            let message = value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("stream error");
            if value.pointer("/error/type").and_then(Value::as_str) == Some("rate_limit_error") {
                return Err(LlmError::RateLimited {
                    provider: PROVIDER.to_string(),
                });
            }
            Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: message.to_string(),
            })
        }
        _ => Ok(SseStep::Skip),
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream, LlmError> {
        let (system, messages) = split_system(request);
        let body = MessagesBody {
            model: request.model.as_deref().unwrap_or(&self.model),
            max_tokens: request.max_tokens,
            system,
            messages,
            stream: true,
        };
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(model = body.model, "Starting messages stream");
        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(PROVIDER, status.as_u16(), &text));
        }
        Ok(text_stream(response, extract_delta))
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self.authorize(self.client.get(&url)).send().await?;
        read_model_list(PROVIDER, response).await
    }
}
