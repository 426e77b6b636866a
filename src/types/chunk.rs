//! Stream chunks emitted by a live invocation.

use crate::types::usage::TokenUsage;
use serde::{Deserialize, Serialize};

/// One element of an invocation's `full_stream`.
///
/// Errors travel in-band as [`StreamChunk::StreamError`] so a chunk stream is
/// always a plain sequence; the eventual fields carry the typed error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chunk_type")]
pub enum StreamChunk {
    /// Partial text content.
    #[serde(rename = "TextDelta")]
    TextDelta { text: String },

    /// Partial reasoning content (providers with extended thinking).
    #[serde(rename = "ReasoningDelta")]
    ReasoningDelta { text: String },

    /// A completed tool invocation requested by the model.
    #[serde(rename = "ToolCall")]
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },

    /// Latest partial structured value (schema-constrained mode).
    #[serde(rename = "ObjectDelta")]
    ObjectDelta { value: serde_json::Value },

    /// Usage and provider metadata, typically near the end of the stream.
    #[serde(rename = "Metadata")]
    Metadata {
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
        #[serde(skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<serde_json::Value>,
    },

    /// Stream completed normally.
    #[serde(rename = "StreamEnd")]
    StreamEnd {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },

    /// Stream terminated with an error (including cancellation).
    #[serde(rename = "StreamError")]
    StreamError { message: String },
}

impl StreamChunk {
    pub fn text_delta(text: impl Into<String>) -> Self {
        StreamChunk::TextDelta { text: text.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamChunk::StreamEnd { .. } | StreamChunk::StreamError { .. }
        )
    }
}
