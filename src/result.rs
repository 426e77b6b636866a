//! Tagged invocation results.
//!
//! A result is either a text invocation or a structured-object invocation,
//! and the tag mirrors the binary dispatch decision made by the
//! orchestrator. Both shapes expose the same duality: a consumable chunk
//! stream plus eventual fields resolved by a background driver, so callers
//! can await a final value without draining the stream.

use crate::provider::ProviderKind;
use crate::stream::{Eventual, EventualSet};
use crate::types::tool::ToolCall;
use crate::types::usage::TokenUsage;
use crate::ChunkStream;
use serde_json::Value;
use std::fmt;

/// Result of a free-text invocation.
pub struct TextInvocation {
    /// Provider the call was dispatched to.
    pub provider: ProviderKind,
    /// Every chunk of the live stream, token-smoothed.
    pub full_stream: ChunkStream,
    /// Concatenated text content, resolved at stream end.
    pub text: Eventual<String>,
    /// Concatenated reasoning content, `None` when the model emitted none.
    pub reasoning: Eventual<Option<String>>,
    /// Tool calls requested by the model.
    pub tool_calls: Eventual<Vec<ToolCall>>,
    /// Token accounting reported by the provider.
    pub usage: Eventual<TokenUsage>,
    /// Raw provider metadata (request id, served model, ...).
    pub provider_metadata: Eventual<Value>,
}

/// Result of a schema-constrained invocation.
pub struct ObjectInvocation {
    pub provider: ProviderKind,
    /// Every chunk of the live stream, unsmoothed.
    pub full_stream: ChunkStream,
    /// Final structured value, schema-validated before it resolves.
    pub object: Eventual<Value>,
    pub usage: Eventual<TokenUsage>,
    pub provider_metadata: Eventual<Value>,
}

/// What an invocation produced, tagged by output shape.
pub enum InvocationResult {
    Text(TextInvocation),
    Object(ObjectInvocation),
}

impl InvocationResult {
    pub fn provider(&self) -> ProviderKind {
        match self {
            InvocationResult::Text(t) => t.provider,
            InvocationResult::Object(o) => o.provider,
        }
    }

    /// Consume the result, taking the chunk stream regardless of shape.
    pub fn into_stream(self) -> ChunkStream {
        match self {
            InvocationResult::Text(t) => t.full_stream,
            InvocationResult::Object(o) => o.full_stream,
        }
    }

    pub fn as_text(&self) -> Option<&TextInvocation> {
        match self {
            InvocationResult::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectInvocation> {
        match self {
            InvocationResult::Object(o) => Some(o),
            _ => None,
        }
    }
}

// The chunk stream is an opaque boxed stream; debug output carries the
// provider tag only.
impl fmt::Debug for TextInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextInvocation")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ObjectInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectInvocation")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for InvocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationResult::Text(t) => f.debug_tuple("Text").field(t).finish(),
            InvocationResult::Object(o) => f.debug_tuple("Object").field(o).finish(),
        }
    }
}

impl TextInvocation {
    pub(crate) fn from_parts(
        provider: ProviderKind,
        full_stream: ChunkStream,
        eventuals: EventualSet,
    ) -> Self {
        Self {
            provider,
            full_stream,
            text: eventuals.text,
            reasoning: eventuals.reasoning,
            tool_calls: eventuals.tool_calls,
            usage: eventuals.usage,
            provider_metadata: eventuals.provider_metadata,
        }
    }
}

impl ObjectInvocation {
    pub(crate) fn from_parts(
        provider: ProviderKind,
        full_stream: ChunkStream,
        eventuals: EventualSet,
    ) -> Self {
        Self {
            provider,
            full_stream,
            object: eventuals.object,
            usage: eventuals.usage,
            provider_metadata: eventuals.provider_metadata,
        }
    }
}
