//! End-to-end orchestrator behavior over a scripted backend.

use async_trait::async_trait;
use chaincall::{
    ChainError, ErrorKind, GenerationConfig, GenerationRequest, InvocationResult,
    LanguageModelHandle, Message, ObjectCall, Orchestrator, OutputMode, ProviderDescriptor,
    ProviderKind, RawInvocation, SmoothConfig, StreamChunk, StreamingBackend, TextCall,
    ToolDefinition, TokenUsage,
};
use futures::StreamExt;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Replays a fixed chunk script and records every call it receives.
struct ScriptedBackend {
    chunks: Vec<StreamChunk>,
    hang: bool,
    fail_with: Option<ChainError>,
    text_calls: Mutex<Vec<TextCall>>,
    object_calls: Mutex<Vec<ObjectCall>>,
}

impl ScriptedBackend {
    fn replaying(chunks: Vec<StreamChunk>) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            hang: false,
            fail_with: None,
            text_calls: Mutex::new(Vec::new()),
            object_calls: Mutex::new(Vec::new()),
        })
    }

    fn hanging() -> Arc<Self> {
        Arc::new(Self {
            chunks: Vec::new(),
            hang: true,
            fail_with: None,
            text_calls: Mutex::new(Vec::new()),
            object_calls: Mutex::new(Vec::new()),
        })
    }

    fn failing(err: ChainError) -> Arc<Self> {
        Arc::new(Self {
            chunks: Vec::new(),
            hang: false,
            fail_with: Some(err),
            text_calls: Mutex::new(Vec::new()),
            object_calls: Mutex::new(Vec::new()),
        })
    }

    fn invocation(&self) -> chaincall::Result<RawInvocation> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        if self.hang {
            return Ok(RawInvocation::new(Box::pin(futures::stream::pending())));
        }
        Ok(RawInvocation::new(Box::pin(futures::stream::iter(
            self.chunks.clone(),
        ))))
    }
}

#[async_trait]
impl StreamingBackend for ScriptedBackend {
    async fn stream_text(&self, call: TextCall) -> chaincall::Result<RawInvocation> {
        let invocation = self.invocation();
        self.text_calls.lock().unwrap().push(call);
        invocation
    }

    async fn stream_object(&self, call: ObjectCall) -> chaincall::Result<RawInvocation> {
        let invocation = self.invocation();
        self.object_calls.lock().unwrap().push(call);
        invocation
    }
}

fn orchestrator(backend: Arc<ScriptedBackend>) -> Orchestrator {
    Orchestrator::with_backend(backend).smoothing(SmoothConfig::immediate())
}

fn end_chunk() -> StreamChunk {
    StreamChunk::StreamEnd {
        finish_reason: Some("stop".into()),
    }
}

fn openai_request(messages: Vec<Message>) -> GenerationRequest {
    GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Openai, "sk-test"),
        GenerationConfig::for_model("gpt-test"),
    )
    .messages(messages)
    .build()
    .unwrap()
}

#[tokio::test]
async fn test_text_invocation_duality() {
    let backend = ScriptedBackend::replaying(vec![
        StreamChunk::text_delta("Hel"),
        StreamChunk::text_delta("lo"),
        StreamChunk::Metadata {
            usage: Some(TokenUsage::new(3, 2)),
            provider_metadata: Some(json!({"id": "req_1"})),
        },
        end_chunk(),
    ]);

    let result = orchestrator(backend)
        .run(openai_request(vec![Message::user("hi")]))
        .await
        .unwrap();

    let text = match result {
        InvocationResult::Text(t) => t,
        InvocationResult::Object(_) => panic!("expected text result"),
    };

    // Eventuals resolve without the stream being consumed.
    assert_eq!(text.text.get().await.unwrap(), "Hello");
    assert_eq!(text.usage.get().await.unwrap().total_tokens, 5);
    assert_eq!(
        text.provider_metadata.get().await.unwrap()["id"],
        "req_1"
    );

    // And the stream still yields everything, with sub-word deltas intact.
    let deltas: Vec<String> = text
        .full_stream
        .filter_map(|c| async move {
            match c {
                StreamChunk::TextDelta { text } => Some(text),
                _ => None,
            }
        })
        .collect()
        .await;
    assert_eq!(deltas, vec!["Hel", "lo"]);
}

#[tokio::test]
async fn test_bursty_deltas_smoothed_at_word_boundaries() {
    let backend = ScriptedBackend::replaying(vec![
        StreamChunk::text_delta("The quick brown fox"),
        end_chunk(),
    ]);

    let result = orchestrator(backend)
        .run(openai_request(vec![Message::user("hi")]))
        .await
        .unwrap();

    let deltas: Vec<String> = result
        .into_stream()
        .filter_map(|c| async move {
            match c {
                StreamChunk::TextDelta { text } => Some(text),
                _ => None,
            }
        })
        .collect()
        .await;
    assert_eq!(deltas, vec!["The ", "quick ", "brown ", "fox"]);
}

#[tokio::test]
async fn test_rule_violations_reported_together() {
    let backend = ScriptedBackend::replaying(vec![end_chunk()]);
    let orchestrator = orchestrator(backend.clone());

    // Empty model and a first assistant turn violate two Anthropic rules.
    let req = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Anthropic, "sk-ant"),
        GenerationConfig::for_model(""),
    )
    .message(Message::assistant("I speak first"))
    .build()
    .unwrap();

    let err = orchestrator.run(req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Run);
    let rendered = err.to_string();
    assert!(rendered.contains("provider compatibility check failed:"));
    assert!(rendered.lines().count() >= 3, "all violations listed");
    assert!(backend.text_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_request_rejected_before_dispatch() {
    let backend = ScriptedBackend::replaying(vec![end_chunk()]);
    let err = orchestrator(backend.clone())
        .run(openai_request(Vec::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Run);
    assert!(err
        .to_string()
        .contains("neither messages nor a prompt"));
    assert!(backend.text_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rule_transformed_messages_reach_backend() {
    let backend = ScriptedBackend::replaying(vec![end_chunk()]);

    // Adjacent same-role text messages are merged for Google.
    let req = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Google, "key"),
        GenerationConfig::for_model("gemini-test"),
    )
    .message(Message::user("part one"))
    .message(Message::user("part two"))
    .build()
    .unwrap();

    orchestrator(backend.clone()).run(req).await.unwrap();

    let calls = backend.text_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].messages.len(), 1);
    assert_eq!(calls[0].messages[0].text(), "part one\npart two");
}

#[tokio::test]
async fn test_reserved_provider_key_stripped_from_options() {
    let backend = ScriptedBackend::replaying(vec![end_chunk()]);

    let mut config = GenerationConfig::for_model("gpt-test");
    config
        .provider_options
        .insert("provider".into(), json!("openai"));
    config.provider_options.insert("seed".into(), json!(7));

    let req = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Openai, "sk-test"),
        config,
    )
    .message(Message::user("hi"))
    .build()
    .unwrap();

    orchestrator(backend.clone()).run(req).await.unwrap();

    let calls = backend.text_calls.lock().unwrap();
    assert!(!calls[0].provider_options.contains_key("provider"));
    assert_eq!(calls[0].provider_options["seed"], 7);
}

#[tokio::test]
async fn test_tool_definitions_become_registry() {
    let backend = ScriptedBackend::replaying(vec![end_chunk()]);

    let mut config = GenerationConfig::for_model("gpt-test");
    config.tools.push(ToolDefinition {
        name: "get_weather".into(),
        description: Some("Look up current weather".into()),
        parameters: json!({"type": "object", "properties": {"city": {"type": "string"}}}),
    });

    let req = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Openai, "sk-test"),
        config,
    )
    .message(Message::user("weather in Oslo?"))
    .build()
    .unwrap();

    orchestrator(backend.clone()).run(req).await.unwrap();

    let calls = backend.text_calls.lock().unwrap();
    assert!(calls[0].tools.contains_key("get_weather"));
}

#[tokio::test]
async fn test_malformed_tool_schema_fails_before_dispatch() {
    let backend = ScriptedBackend::replaying(vec![end_chunk()]);

    let mut config = GenerationConfig::for_model("gpt-test");
    config.tools.push(ToolDefinition {
        name: "broken".into(),
        description: None,
        parameters: json!({"type": 42}),
    });

    let req = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Openai, "sk-test"),
        config,
    )
    .message(Message::user("hi"))
    .build()
    .unwrap();

    let err = orchestrator(backend.clone()).run(req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Run);
    assert!(backend.text_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_object_invocation_validates_against_schema() {
    let schema = json!({
        "type": "object",
        "properties": {"name": {"type": "string"}},
        "required": ["name"]
    });
    let backend = ScriptedBackend::replaying(vec![
        StreamChunk::ObjectDelta {
            value: json!({"name": "Ada"}),
        },
        end_chunk(),
    ]);

    let req = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Openai, "sk-test"),
        GenerationConfig::for_model("gpt-test"),
    )
    .message(Message::user("who?"))
    .schema(schema, OutputMode::Object)
    .build()
    .unwrap();

    let result = orchestrator(backend.clone()).run(req).await.unwrap();
    let object = match result {
        InvocationResult::Object(o) => o,
        InvocationResult::Text(_) => panic!("expected object result"),
    };
    assert_eq!(object.object.get().await.unwrap(), json!({"name": "Ada"}));
    assert_eq!(backend.object_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_nonconforming_object_fails_the_eventual() {
    let schema = json!({
        "type": "object",
        "properties": {"name": {"type": "string"}},
        "required": ["name"]
    });
    let backend = ScriptedBackend::replaying(vec![
        StreamChunk::ObjectDelta {
            value: json!({"wrong": true}),
        },
        end_chunk(),
    ]);

    let req = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Openai, "sk-test"),
        GenerationConfig::for_model("gpt-test"),
    )
    .message(Message::user("who?"))
    .schema(schema, OutputMode::Object)
    .build()
    .unwrap();

    let result = orchestrator(backend).run(req).await.unwrap();
    let object = match result {
        InvocationResult::Object(o) => o,
        InvocationResult::Text(_) => panic!("expected object result"),
    };
    let err = object.object.get().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Run);
    assert!(err.to_string().contains("does not conform"));
}

#[tokio::test]
async fn test_cancellation_settles_everything_in_bounded_time() {
    let backend = ScriptedBackend::hanging();
    let cancel = CancellationToken::new();

    let req = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Openai, "sk-test"),
        GenerationConfig::for_model("gpt-test"),
    )
    .message(Message::user("hi"))
    .cancel_token(cancel.clone())
    .build()
    .unwrap();

    let result = orchestrator(backend).run(req).await.unwrap();
    let mut text = match result {
        InvocationResult::Text(t) => t,
        InvocationResult::Object(_) => panic!("expected text result"),
    };

    cancel.cancel();

    let settled = tokio::time::timeout(Duration::from_secs(1), text.text.get())
        .await
        .expect("eventual must settle after cancellation");
    assert!(settled.is_err());

    let last = tokio::time::timeout(Duration::from_secs(1), async {
        let mut last = None;
        while let Some(c) = text.full_stream.next().await {
            last = Some(c);
        }
        last
    })
    .await
    .expect("stream must terminate after cancellation");
    assert!(matches!(last, Some(StreamChunk::StreamError { .. })));
}

#[tokio::test]
async fn test_backend_failure_propagates_classified() {
    let backend = ScriptedBackend::failing(ChainError::run(
        "provider rate limited the request (HTTP 429)",
    ));

    let err = orchestrator(backend)
        .run(openai_request(vec![Message::user("hi")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Run);
    assert!(err.to_string().contains("rate limited"));
}

#[tokio::test]
async fn test_custom_handle_bypasses_resolution() {
    let backend = ScriptedBackend::replaying(vec![
        StreamChunk::text_delta("ok"),
        end_chunk(),
    ]);

    // The descriptor alone would fail resolution (blank key), but a
    // pre-built handle skips that step entirely.
    let req = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::OpenaiCompatible, ""),
        GenerationConfig::for_model("local-model"),
    )
    .message(Message::user("hi"))
    .model_handle(LanguageModelHandle {
        provider: ProviderKind::OpenaiCompatible,
        model: "local-model".into(),
        base_url: "http://localhost:8080/v1".into(),
        api_key: "local".into(),
        cache_control: false,
    })
    .build()
    .unwrap();

    let result = orchestrator(backend.clone()).run(req).await.unwrap();
    assert_eq!(result.provider(), ProviderKind::OpenaiCompatible);
    let calls = backend.text_calls.lock().unwrap();
    assert_eq!(calls[0].handle.base_url, "http://localhost:8080/v1");
}

#[tokio::test]
async fn test_result_debug_elides_the_stream() {
    let backend = ScriptedBackend::replaying(vec![end_chunk()]);
    let result = orchestrator(backend)
        .run(openai_request(vec![Message::user("hi")]))
        .await
        .unwrap();
    let rendered = format!("{result:?}");
    assert!(rendered.contains("Text"));
    assert!(rendered.contains("Openai"));
}

#[tokio::test]
async fn test_telemetry_flag_reaches_backend() {
    let backend = ScriptedBackend::replaying(vec![end_chunk()]);

    let mut config = GenerationConfig::for_model("gpt-test");
    assert!(config.telemetry, "telemetry is on by default");
    config.telemetry = false;

    let req = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Openai, "sk-test"),
        config,
    )
    .message(Message::user("hi"))
    .build()
    .unwrap();

    orchestrator(backend.clone()).run(req).await.unwrap();

    let calls = backend.text_calls.lock().unwrap();
    assert!(!calls[0].telemetry);
}

#[tokio::test]
async fn test_in_band_stream_error_fails_eventuals() {
    let backend = ScriptedBackend::replaying(vec![
        StreamChunk::text_delta("partial"),
        StreamChunk::StreamError {
            message: "provider stream interrupted".into(),
        },
    ]);

    let result = orchestrator(backend)
        .run(openai_request(vec![Message::user("hi")]))
        .await
        .unwrap();
    let text = match result {
        InvocationResult::Text(t) => t,
        InvocationResult::Object(_) => panic!("expected text result"),
    };
    let err = text.text.get().await.unwrap_err();
    assert!(err.to_string().contains("interrupted"));
}
