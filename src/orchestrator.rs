//! Invocation orchestration.
//!
//! The orchestrator wires the pipeline together for one request: rule pass,
//! adapter resolution, tool registry construction, backend dispatch and
//! result fan-out. It holds no per-request state and is cheap to share.

use crate::backend::{HttpBackend, ObjectCall, StreamingBackend, TextCall};
use crate::error::ChainError;
use crate::provider::{resolve, AdapterOptions};
use crate::request::GenerationRequest;
use crate::result::{InvocationResult, ObjectInvocation, TextInvocation};
use crate::rules::{RuleEngine, RuleViolation};
use crate::stream::{fan_out, smooth, FanOutConfig, SmoothConfig};
use crate::tools::build_registry;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Reserved key in `provider_options` that names routing intent and must
/// never leak into the wire body.
const RESERVED_PROVIDER_KEY: &str = "provider";
/// Reserved key stripped from schema-constrained calls; the schema travels
/// in the dedicated request field.
const RESERVED_SCHEMA_KEY: &str = "schema";

pub struct Orchestrator {
    backend: Arc<dyn StreamingBackend>,
    rules: RuleEngine,
    smoothing: SmoothConfig,
}

impl Orchestrator {
    /// Production orchestrator over the HTTP streaming backend.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(HttpBackend::new()))
    }

    pub fn with_backend(backend: Arc<dyn StreamingBackend>) -> Self {
        Self {
            backend,
            rules: RuleEngine::with_defaults(),
            smoothing: SmoothConfig::default(),
        }
    }

    /// Override the token-smoothing pacing (tests use
    /// [`SmoothConfig::immediate`]).
    pub fn smoothing(mut self, config: SmoothConfig) -> Self {
        self.smoothing = config;
        self
    }

    /// Run one invocation end to end.
    ///
    /// Fails fast, before any provider traffic, when a compatibility rule is
    /// violated, the provider cannot be resolved, or a tool definition does
    /// not carry a valid schema. Once the provider answers, the returned
    /// result streams lazily.
    pub async fn run(&self, request: GenerationRequest) -> Result<InvocationResult> {
        let kind = request.provider.kind;

        let mut report = self.rules.apply(kind, &request.messages, &request.config);
        if request.messages.is_empty() && request.prompt.is_none() {
            // Rules only see messages/config, so the prompt-aware check
            // lives here.
            report.violations.insert(
                0,
                RuleViolation::new("request carries neither messages nor a prompt"),
            );
        }
        if !report.is_clean() {
            let mut message = String::from("provider compatibility check failed:");
            for v in &report.violations {
                message.push('\n');
                message.push_str(&v.message);
            }
            return Err(ChainError::run(message));
        }
        let messages = report.messages;
        let config = report.config;

        // A caller-supplied handle bypasses resolution entirely.
        let handle = match request.handle {
            Some(handle) => handle,
            None => {
                let factory = resolve(&request.provider)?;
                factory(
                    &config.model,
                    AdapterOptions {
                        cache_control: config.cache_control,
                    },
                )
            }
        };

        let tools = build_registry(&config.tools)?;

        let mut provider_options = config.provider_options.clone();
        provider_options.remove(RESERVED_PROVIDER_KEY);

        let cancel = request.cancel.clone().unwrap_or_default();

        if config.telemetry {
            info!(
                provider = kind.as_str(),
                model = handle.model.as_str(),
                tools = tools.len(),
                structured = request.schema.is_some(),
                "chaincall invocation start"
            );
        }

        // Binary dispatch: a schema plus an output mode selects the
        // structured path, anything else is free text.
        match (request.schema, request.output_mode) {
            (Some(schema), Some(output_mode)) => {
                provider_options.remove(RESERVED_SCHEMA_KEY);
                let raw = self
                    .backend
                    .stream_object(ObjectCall {
                        handle,
                        messages,
                        prompt: request.prompt,
                        schema: schema.clone(),
                        output_mode,
                        temperature: config.temperature,
                        max_tokens: config.max_tokens,
                        top_p: config.top_p,
                        provider_options,
                        telemetry: config.telemetry,
                        cancel: cancel.clone(),
                    })
                    .await?;
                let (stream, eventuals) = fan_out(
                    raw.chunks,
                    cancel,
                    FanOutConfig {
                        object_schema: Some(schema),
                    },
                );
                Ok(InvocationResult::Object(ObjectInvocation::from_parts(
                    kind, stream, eventuals,
                )))
            }
            (schema, output_mode) => {
                if schema.is_some() || output_mode.is_some() {
                    debug!(
                        provider = kind.as_str(),
                        "schema or output mode supplied alone, generating free text"
                    );
                }
                let raw = self
                    .backend
                    .stream_text(TextCall {
                        handle,
                        messages,
                        prompt: request.prompt,
                        tools,
                        temperature: config.temperature,
                        max_tokens: config.max_tokens,
                        top_p: config.top_p,
                        provider_options,
                        telemetry: config.telemetry,
                        cancel: cancel.clone(),
                    })
                    .await?;
                let smoothed = smooth(raw.chunks, self.smoothing.clone());
                let (stream, eventuals) = fan_out(smoothed, cancel, FanOutConfig::default());
                Ok(InvocationResult::Text(TextInvocation::from_parts(
                    kind, stream, eventuals,
                )))
            }
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawInvocation;
    use crate::provider::{ProviderDescriptor, ProviderKind};
    use crate::request::{GenerationConfig, GenerationRequest};
    use crate::types::chunk::StreamChunk;
    use crate::types::message::Message;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        calls: AtomicUsize,
    }

    impl CountingBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn stream() -> RawInvocation {
            RawInvocation::new(Box::pin(futures::stream::iter(vec![
                StreamChunk::text_delta("ok"),
                StreamChunk::StreamEnd {
                    finish_reason: Some("stop".into()),
                },
            ])))
        }
    }

    #[async_trait]
    impl StreamingBackend for CountingBackend {
        async fn stream_text(&self, _call: TextCall) -> crate::Result<RawInvocation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::stream())
        }

        async fn stream_object(&self, _call: ObjectCall) -> crate::Result<RawInvocation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::stream())
        }
    }

    fn request(model: &str) -> GenerationRequest {
        GenerationRequest::builder(
            ProviderDescriptor::new(ProviderKind::Openai, "sk-test"),
            GenerationConfig::for_model(model),
        )
        .message(Message::user("hi"))
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn test_rule_violation_fails_before_dispatch() {
        let backend = CountingBackend::new();
        let orchestrator =
            Orchestrator::with_backend(backend.clone()).smoothing(SmoothConfig::immediate());

        let err = orchestrator.run(request("")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Run);
        assert!(err
            .to_string()
            .contains("provider compatibility check failed:"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_dispatch() {
        let backend = CountingBackend::new();
        let orchestrator =
            Orchestrator::with_backend(backend.clone()).smoothing(SmoothConfig::immediate());

        let req = GenerationRequest::builder(
            ProviderDescriptor::new(ProviderKind::Anthropic, "  "),
            GenerationConfig::for_model("claude"),
        )
        .message(Message::user("hi"))
        .build()
        .unwrap();

        let err = orchestrator.run(req).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ProviderConfig);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_text_path_returns_text_result() {
        let backend = CountingBackend::new();
        let orchestrator =
            Orchestrator::with_backend(backend.clone()).smoothing(SmoothConfig::immediate());

        let result = orchestrator.run(request("gpt-test")).await.unwrap();
        assert_eq!(result.provider(), ProviderKind::Openai);
        match result {
            InvocationResult::Text(text) => {
                assert_eq!(text.text.get().await.unwrap(), "ok");
            }
            InvocationResult::Object(_) => panic!("expected text result"),
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_schema_selects_object_path() {
        let backend = CountingBackend::new();
        let orchestrator =
            Orchestrator::with_backend(backend.clone()).smoothing(SmoothConfig::immediate());

        let req = GenerationRequest::builder(
            ProviderDescriptor::new(ProviderKind::Openai, "sk-test"),
            GenerationConfig::for_model("gpt-test"),
        )
        .message(Message::user("hi"))
        .schema(
            serde_json::json!({"type": "object"}),
            crate::request::OutputMode::Object,
        )
        .build()
        .unwrap();

        let result = orchestrator.run(req).await.unwrap();
        assert!(matches!(result, InvocationResult::Object(_)));
    }
}
