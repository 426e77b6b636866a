//! HTTP backend behavior against a mock provider endpoint.

use chaincall::{
    CallableToolMap, ErrorKind, HttpBackend, LanguageModelHandle, Message, ObjectCall,
    OutputMode, ProviderKind, StreamChunk, StreamingBackend, TextCall,
};
use futures::StreamExt;
use mockito::{Matcher, Server};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn handle(base_url: &str) -> LanguageModelHandle {
    LanguageModelHandle {
        provider: ProviderKind::OpenaiCompatible,
        model: "test-model".into(),
        base_url: base_url.to_string(),
        api_key: "sk-test".into(),
        cache_control: false,
    }
}

fn text_call(base_url: &str) -> TextCall {
    TextCall {
        handle: handle(base_url),
        messages: vec![Message::user("hi")],
        prompt: None,
        tools: CallableToolMap::new(),
        temperature: None,
        max_tokens: None,
        top_p: None,
        provider_options: serde_json::Map::new(),
        telemetry: true,
        cancel: CancellationToken::new(),
    }
}

fn sse_body(frames: &[&str]) -> String {
    frames
        .iter()
        .map(|f| format!("data: {f}\n\n"))
        .collect::<String>()
}

#[tokio::test]
async fn test_streams_text_deltas_from_sse() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "test-model",
            "stream": true,
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&[
            r#"{"id":"r1","model":"test-model","choices":[{"delta":{"content":"Hel"}}]}"#,
            r#"{"choices":[{"delta":{"content":"lo"}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":2}}"#,
            "[DONE]",
        ]))
        .create_async()
        .await;

    let backend = HttpBackend::new();
    let invocation = backend.stream_text(text_call(&server.url())).await.unwrap();
    let chunks: Vec<StreamChunk> = invocation.chunks.collect().await;

    let text: String = chunks
        .iter()
        .filter_map(|c| match c {
            StreamChunk::TextDelta { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hello");

    let usage = chunks.iter().find_map(|c| match c {
        StreamChunk::Metadata { usage, .. } => *usage,
        _ => None,
    });
    assert_eq!(usage.unwrap().total_tokens, 5);
    assert!(matches!(
        chunks.last(),
        Some(StreamChunk::StreamEnd { finish_reason: Some(r) }) if r == "stop"
    ));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_maps_to_provider_config() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":"invalid api key"}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new();
    let err = backend
        .stream_text(text_call(&server.url()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderConfig);
    assert!(err.cause().unwrap().contains("invalid api key"));
}

#[tokio::test]
async fn test_rate_limit_maps_to_run_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("slow down")
        .create_async()
        .await;

    let backend = HttpBackend::new();
    let err = backend
        .stream_text(text_call(&server.url()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Run);
}

#[tokio::test]
async fn test_object_call_sends_response_format() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "response_format": {"type": "json_schema"},
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&[
            r#"{"choices":[{"delta":{"content":"{\"a\":1}"},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ]))
        .create_async()
        .await;

    let backend = HttpBackend::new();
    let call = ObjectCall {
        handle: handle(&server.url()),
        messages: vec![Message::user("give me an object")],
        prompt: None,
        schema: json!({"type": "object"}),
        output_mode: OutputMode::Object,
        temperature: None,
        max_tokens: None,
        top_p: None,
        provider_options: serde_json::Map::new(),
        telemetry: true,
        cancel: CancellationToken::new(),
    };
    let invocation = backend.stream_object(call).await.unwrap();
    let chunks: Vec<StreamChunk> = invocation.chunks.collect().await;

    assert!(chunks.iter().any(|c| matches!(
        c,
        StreamChunk::ObjectDelta { value } if value == &json!({"a": 1})
    )));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_prompt_becomes_single_user_message() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "messages": [{"role": "user", "content": "one-shot"}],
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&["[DONE]"]))
        .create_async()
        .await;

    let backend = HttpBackend::new();
    let mut call = text_call(&server.url());
    call.messages.clear();
    call.prompt = Some("one-shot".into());
    backend
        .stream_text(call)
        .await
        .unwrap()
        .chunks
        .collect::<Vec<_>>()
        .await;
    mock.assert_async().await;
}

#[tokio::test]
async fn test_tools_serialized_into_wire_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "tools": [{"type": "function", "function": {"name": "get_weather"}}],
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&["[DONE]"]))
        .create_async()
        .await;

    let backend = HttpBackend::new();
    let mut call = text_call(&server.url());
    call.tools.insert(
        "get_weather".into(),
        chaincall::CallableTool {
            description: "Look up current weather".into(),
            parameters: json!({"type": "object"}),
        },
    );
    backend
        .stream_text(call)
        .await
        .unwrap()
        .chunks
        .collect::<Vec<_>>()
        .await;
    mock.assert_async().await;
}
