//! Provider adapter selection.
//!
//! Providers form a closed set of variants, each mapped to a factory value
//! producing a [`LanguageModelHandle`]. Adding a provider means adding one
//! variant and one factory arm; there is no inheritance chain. The handle is
//! opaque to the orchestrator beyond being passed into the streaming backend.

use crate::error::ChainError;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Closed set of supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Openai,
    Anthropic,
    Google,
    Mistral,
    Groq,
    /// Any endpoint speaking the OpenAI chat dialect; requires an explicit
    /// base URL in the descriptor.
    OpenaiCompatible,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenaiCompatible => "openai-compatible",
        }
    }

    fn default_base_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Openai => Some("https://api.openai.com/v1"),
            ProviderKind::Anthropic => Some("https://api.anthropic.com/v1"),
            ProviderKind::Google => {
                Some("https://generativelanguage.googleapis.com/v1beta/openai")
            }
            ProviderKind::Mistral => Some("https://api.mistral.ai/v1"),
            ProviderKind::Groq => Some("https://api.groq.com/openai/v1"),
            ProviderKind::OpenaiCompatible => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies which adapter family to use. Immutable once passed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: Option<String>,
}

impl ProviderDescriptor {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Per-call adapter options.
#[derive(Debug, Clone, Default)]
pub struct AdapterOptions {
    /// Provider-side prompt caching hint.
    pub cache_control: bool,
}

/// Concrete model handle, ready to be passed into the streaming backend.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageModelHandle {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub cache_control: bool,
}

/// Factory producing model handles for one resolved provider.
pub type AdapterFactory = Box<dyn Fn(&str, AdapterOptions) -> LanguageModelHandle + Send + Sync>;

/// Map a provider descriptor to its adapter factory.
///
/// Fails with a configuration error when credentials are absent or the
/// descriptor cannot be addressed (no base URL for a compatible endpoint).
pub fn resolve(descriptor: &ProviderDescriptor) -> Result<AdapterFactory> {
    if descriptor.api_key.trim().is_empty() {
        return Err(ChainError::provider_config(format!(
            "missing API key for provider '{}'",
            descriptor.kind
        )));
    }

    let base_url = match (&descriptor.base_url, descriptor.kind.default_base_url()) {
        (Some(url), _) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
        (_, Some(default)) => default.to_string(),
        _ => {
            return Err(ChainError::provider_config(format!(
                "provider '{}' requires an explicit base URL",
                descriptor.kind
            )))
        }
    };

    let kind = descriptor.kind;
    let api_key = descriptor.api_key.clone();

    Ok(Box::new(move |model_id, options| LanguageModelHandle {
        provider: kind,
        model: model_id.to_string(),
        base_url: base_url.clone(),
        api_key: api_key.clone(),
        cache_control: options.cache_control,
    }))
}
