//! Normalized generation request and configuration.

use crate::error::ChainError;
use crate::provider::{LanguageModelHandle, ProviderDescriptor};
use crate::types::message::Message;
use crate::types::tool::ToolDefinition;
use crate::Result;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Provider-agnostic generation options.
///
/// Mutated only by the rule engine, never by the orchestrator itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// Provider-specific passthrough options, forwarded verbatim to the
    /// backend (minus the reserved routing key, see the orchestrator).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub provider_options: serde_json::Map<String, serde_json::Value>,
    /// Provider-side prompt caching hint.
    #[serde(default)]
    pub cache_control: bool,
    /// Per-call telemetry switch; disables dispatch logging when false.
    #[serde(default = "telemetry_default")]
    pub telemetry: bool,
}

fn telemetry_default() -> bool {
    true
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: None,
            max_tokens: None,
            top_p: None,
            tools: Vec::new(),
            provider_options: serde_json::Map::new(),
            cache_control: false,
            telemetry: true,
        }
    }
}

impl GenerationConfig {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Output shape selector for schema-constrained generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    Object,
    Array,
    NoSchema,
}

/// One invocation's worth of input. Constructed per call, not reused.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub provider: ProviderDescriptor,
    pub messages: Vec<Message>,
    pub prompt: Option<String>,
    pub config: GenerationConfig,
    pub schema: Option<serde_json::Value>,
    pub output_mode: Option<OutputMode>,
    pub cancel: Option<CancellationToken>,
    /// Pre-built handle bypassing adapter resolution (testing/extension).
    pub handle: Option<LanguageModelHandle>,
}

impl GenerationRequest {
    pub fn builder(provider: ProviderDescriptor, config: GenerationConfig) -> RequestBuilder {
        RequestBuilder {
            provider,
            config,
            messages: Vec::new(),
            prompt: None,
            schema: None,
            output_mode: None,
            cancel: None,
            handle: None,
        }
    }
}

/// Fluent builder for [`GenerationRequest`].
#[derive(Debug)]
pub struct RequestBuilder {
    provider: ProviderDescriptor,
    config: GenerationConfig,
    messages: Vec<Message>,
    prompt: Option<String>,
    schema: Option<serde_json::Value>,
    output_mode: Option<OutputMode>,
    cancel: Option<CancellationToken>,
    handle: Option<LanguageModelHandle>,
}

impl RequestBuilder {
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Schema-constrained output. Only meaningful together with an output
    /// mode; absent either, generation degrades to free text.
    pub fn schema(mut self, schema: serde_json::Value, mode: OutputMode) -> Self {
        self.schema = Some(schema);
        self.output_mode = Some(mode);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn model_handle(mut self, handle: LanguageModelHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Exactly one of messages (possibly empty) or prompt drives generation.
    pub fn build(self) -> Result<GenerationRequest> {
        if self.prompt.is_some() && !self.messages.is_empty() {
            return Err(ChainError::run(
                "request must carry either messages or a prompt, not both",
            ));
        }
        Ok(GenerationRequest {
            provider: self.provider,
            messages: self.messages,
            prompt: self.prompt,
            config: self.config,
            schema: self.schema,
            output_mode: self.output_mode,
            cancel: self.cancel,
            handle: self.handle,
        })
    }
}
