use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;

use super::sse::{SseEvent, SseStep, text_stream};
use super::{
    ChatMessage, ChatRequest, ChatStream, LlmProvider, http_client, invalid_response,
    read_model_list, status_error,
};
use crate::error::LlmError;

const PROVIDER: &str = "openai_compatible";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Any backend speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    stream: bool,
}

impl OpenAiCompatibleProvider {
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
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

/// `data: {"choices":[{"delta":{"content":"..."}}]}` until `data: [DONE]`.
pub(crate) fn extract_delta(event: &SseEvent) -> Result<SseStep, LlmError> {
    let data = event.data.trim();
    if data == "[DONE]" {
        return Ok(SseStep::Done);
    }
    if data.is_empty() {
        return Ok(SseStep::Skip);
    }
    let value: Value = serde_json::from_str(data)
        .map_err(|e| invalid_response(PROVIDER, format!("bad stream chunk: {e}")))?;
    if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
        return Err(LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: message.to_string(),
        });
    }
    Ok(value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map(|text| SseStep::Text(text.to_string()))
        .unwrap_or(SseStep::Skip))
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream, LlmError> {
        let body = CompletionBody {
            model: request.model.as_deref().unwrap_or(&self.model),
            messages: &request.messages,
            max_tokens: request.max_tokens,
            stream: true,
        };
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = body.model, "Starting chat completion stream");
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
        let url = format!("{}/models", self.base_url);
        let response = self.authorize(self.client.get(&url)).send().await?;
        read_model_list(PROVIDER, response).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn data(raw: &str) -> SseEvent {
        SseEvent {
            event: None,
            data: raw.to_string(),
        }
    }

    #[test]
    fn extracts_content_deltas() {
        let step =
            extract_delta(&data(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#)).unwrap();
        assert_eq!(step, SseStep::Text("Hel".into()));
        let role_only = extract_delta(&data(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#));
        assert_eq!(role_only.unwrap(), SseStep::Skip);
        assert_eq!(extract_delta(&data("[DONE]")).unwrap(), SseStep::Done);
    }

    #[test]
    fn inline_errors_and_garbage_fail_the_stream() {
        assert!(matches!(
            extract_delta(&data(r#"{"error":{"message":"overloaded"}}"#)),
            Err(LlmError::RequestFailed { .. })
        ));
        assert!(matches!(
            extract_delta(&data("{not json")),
            Err(LlmError::InvalidResponse { .. })
        ));
    }
}
