//! Streaming chat providers against a local Axum server speaking each
//! backend's SSE dialect.

use std::net::SocketAddr;

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use futures::StreamExt;
use secrecy::SecretString;
use serde_json::{Value, json};

use starkclaw::error::LlmError;
use starkclaw::llm::{
    AnthropicProvider, ChatMessage, ChatRequest, LlmProvider, OpenAiCompatibleProvider,
};

fn is_bind_permission_error<E: std::fmt::Display>(err: &E) -> bool {
    err.to_string().contains("Operation not permitted")
        || err.to_string().contains("failed to bind")
}

async fn serve(router: Router) -> Option<String> {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(e) if is_bind_permission_error(&e) => return None,
        Err(e) => panic!("Failed to bind test server: {e:?}"),
    };
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Some(format!("http://{addr}"))
}

const OPENAI_STREAM: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Balance \"}}]}\n\n",
    ": keep-alive\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"is 2 ETH\"}}]}\n\n",
    "data: [DONE]\n\n",
);

const ANTHROPIC_STREAM: &str = concat!(
    "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{}}\n\n",
    "event: ping\ndata: {\"type\":\"ping\"}\n\n",
    "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Swap \"}}\n\n",
    "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"queued\"}}\n\n",
    "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
);

fn sse(body: &'static str) -> ([(header::HeaderName, &'static str); 1], &'static str) {
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

fn request() -> ChatRequest {
    ChatRequest::new(vec![
        ChatMessage::system("You are a wallet assistant."),
        ChatMessage::user("What is my balance?"),
    ])
}

#[tokio::test]
async fn openai_compatible_streams_deltas_and_lists_models() {
    let router = Router::new()
        .route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["stream"], true);
                assert_eq!(body["messages"][0]["role"], "system");
                sse(OPENAI_STREAM)
            }),
        )
        .route(
            "/models",
            get(|| async { Json(json!({"data": [{"id": "gpt-4o-mini"}, {"id": "local-7b"}]})) }),
        );
    let Some(base) = serve(router).await else {
        return;
    };

    let provider = OpenAiCompatibleProvider::new(
        &base,
        Some(SecretString::from("sk-test".to_string())),
        None,
    )
    .unwrap();
    let chunks: Vec<String> = provider
        .stream_chat(&request())
        .await
        .unwrap()
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;
    assert_eq!(chunks, vec!["Balance ", "is 2 ETH"]);
    assert_eq!(
        provider.list_models().await.unwrap(),
        vec!["gpt-4o-mini", "local-7b"]
    );
}

#[tokio::test]
async fn anthropic_streams_text_and_hoists_system_prompt() {
    let router = Router::new().route(
        "/v1/messages",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(headers["x-api-key"], "ak-test");
            assert_eq!(headers["anthropic-version"], "2023-06-01");
            assert_eq!(body["system"], "You are a wallet assistant.");
            assert_eq!(body["messages"].as_array().unwrap().len(), 1);
            sse(ANTHROPIC_STREAM)
        }),
    );
    let Some(base) = serve(router).await else {
        return;
    };

    let provider = AnthropicProvider::new(
        &base,
        Some(SecretString::from("ak-test".to_string())),
        Some("claude-test".to_string()),
    )
    .unwrap();
    assert_eq!(provider.complete(&request()).await.unwrap(), "Swap queued");
}

#[tokio::test]
async fn auth_and_rate_limit_statuses_are_classified() {
    let router = Router::new()
        .route(
            "/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        )
        .route(
            "/v1/messages",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
    let Some(base) = serve(router).await else {
        return;
    };

    let openai = OpenAiCompatibleProvider::new(&base, None, None).unwrap();
    assert!(matches!(
        openai.stream_chat(&request()).await,
        Err(LlmError::AuthFailed { .. })
    ));

    let anthropic = AnthropicProvider::new(&base, None, None).unwrap();
    assert!(matches!(
        anthropic.stream_chat(&request()).await,
        Err(LlmError::RateLimited { .. })
    ));
}
