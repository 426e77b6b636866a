//! One-shot broadcast of a provider stream.
//!
//! A single underlying invocation is consumed exactly once by a driver task,
//! which forwards every chunk to the caller-facing stream and accumulates the
//! eventual values. The chunk stream and the eventual fields therefore always
//! describe the same invocation.

use crate::error::ChainError;
use crate::types::chunk::StreamChunk;
use crate::types::tool::ToolCall;
use crate::types::usage::TokenUsage;
use crate::ChunkStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// A value that resolves once the underlying stream settles.
///
/// Cheap to clone and awaitable any number of times. If the invocation is
/// torn down before resolution, `get` settles to an error rather than
/// pending forever.
#[derive(Debug, Clone)]
pub struct Eventual<T> {
    rx: watch::Receiver<Option<Arc<Result<T, ChainError>>>>,
}

impl<T: Clone> Eventual<T> {
    pub async fn get(&self) -> Result<T, ChainError> {
        let mut rx = self.rx.clone();
        loop {
            if let Some(v) = rx.borrow_and_update().clone() {
                return (*v).clone();
            }
            if rx.changed().await.is_err() {
                return Err(ChainError::unknown(
                    "invocation ended before the value resolved",
                ));
            }
        }
    }

    /// An already-settled eventual, mainly for tests and adapters.
    pub fn ready(value: Result<T, ChainError>) -> Self {
        let (tx, rx) = watch::channel(Some(Arc::new(value)));
        drop(tx);
        Eventual { rx }
    }
}

struct Slot<T> {
    tx: watch::Sender<Option<Arc<Result<T, ChainError>>>>,
}

impl<T> Slot<T> {
    fn pending() -> (Self, Eventual<T>) {
        let (tx, rx) = watch::channel(None);
        (Slot { tx }, Eventual { rx })
    }

    fn resolve(&self, value: Result<T, ChainError>) {
        let _ = self.tx.send(Some(Arc::new(value)));
    }
}

/// Eventual views over one fanned-out invocation.
#[derive(Debug, Clone)]
pub struct EventualSet {
    pub text: Eventual<String>,
    pub reasoning: Eventual<Option<String>>,
    pub object: Eventual<serde_json::Value>,
    pub usage: Eventual<TokenUsage>,
    pub tool_calls: Eventual<Vec<ToolCall>>,
    pub provider_metadata: Eventual<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct FanOutConfig {
    /// When present, the final structured object is validated against this
    /// schema before the `object` eventual resolves.
    pub object_schema: Option<serde_json::Value>,
}

/// Split one raw chunk stream into a forwarded stream plus eventual values.
///
/// Cancellation terminates the forwarded stream with a `StreamError` chunk
/// and settles every eventual to an error state.
pub fn fan_out(
    mut raw: ChunkStream,
    cancel: CancellationToken,
    config: FanOutConfig,
) -> (ChunkStream, EventualSet) {
    let (chunk_tx, chunk_rx) = mpsc::unbounded_channel::<StreamChunk>();

    let (text_slot, text) = Slot::pending();
    let (reasoning_slot, reasoning) = Slot::pending();
    let (object_slot, object) = Slot::pending();
    let (usage_slot, usage) = Slot::pending();
    let (tool_calls_slot, tool_calls) = Slot::pending();
    let (metadata_slot, provider_metadata) = Slot::pending();

    tokio::spawn(async move {
        let mut acc_text = String::new();
        let mut acc_reasoning = String::new();
        let mut acc_object: Option<serde_json::Value> = None;
        let mut acc_usage: Option<TokenUsage> = None;
        let mut acc_tool_calls: Vec<ToolCall> = Vec::new();
        let mut acc_metadata: Option<serde_json::Value> = None;
        let mut failure: Option<ChainError> = None;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let message = "invocation cancelled".to_string();
                    let _ = chunk_tx.send(StreamChunk::StreamError {
                        message: message.clone(),
                    });
                    failure = Some(ChainError::run(message));
                    break;
                }
                next = raw.next() => match next {
                    Some(chunk) => chunk,
                    None => break,
                },
            };

            match &chunk {
                StreamChunk::TextDelta { text } => acc_text.push_str(text),
                StreamChunk::ReasoningDelta { text } => acc_reasoning.push_str(text),
                StreamChunk::ToolCall {
                    id,
                    name,
                    arguments,
                } => acc_tool_calls.push(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                }),
                StreamChunk::ObjectDelta { value } => acc_object = Some(value.clone()),
                StreamChunk::Metadata {
                    usage,
                    provider_metadata,
                } => {
                    if usage.is_some() {
                        acc_usage = *usage;
                    }
                    if let Some(pm) = provider_metadata {
                        acc_metadata = Some(pm.clone());
                    }
                }
                StreamChunk::StreamError { message } => {
                    failure = Some(ChainError::run(message.clone()));
                }
                StreamChunk::StreamEnd { .. } => {}
            }

            let terminal = chunk.is_terminal();
            let _ = chunk_tx.send(chunk);
            if terminal {
                break;
            }
        }
        drop(chunk_tx);

        if let Some(err) = failure {
            text_slot.resolve(Err(err.clone()));
            reasoning_slot.resolve(Err(err.clone()));
            object_slot.resolve(Err(err.clone()));
            usage_slot.resolve(Err(err.clone()));
            tool_calls_slot.resolve(Err(err.clone()));
            metadata_slot.resolve(Err(err));
            return;
        }

        text_slot.resolve(Ok(acc_text));
        reasoning_slot.resolve(Ok(if acc_reasoning.is_empty() {
            None
        } else {
            Some(acc_reasoning)
        }));
        usage_slot.resolve(Ok(acc_usage.unwrap_or_default()));
        tool_calls_slot.resolve(Ok(acc_tool_calls));
        metadata_slot.resolve(Ok(acc_metadata.unwrap_or(serde_json::Value::Null)));
        object_slot.resolve(finalize_object(acc_object, config.object_schema.as_ref()));
    });

    let stream: ChunkStream = Box::pin(futures::stream::unfold(chunk_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    }));
    (
        stream,
        EventualSet {
            text,
            reasoning,
            object,
            usage,
            tool_calls,
            provider_metadata,
        },
    )
}

fn finalize_object(
    object: Option<serde_json::Value>,
    schema: Option<&serde_json::Value>,
) -> Result<serde_json::Value, ChainError> {
    let value = match object {
        Some(v) => v,
        None => return Err(ChainError::run("stream produced no structured object")),
    };
    let Some(schema) = schema else {
        return Ok(value);
    };

    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|e| ChainError::run("invalid output schema").with_cause(e.to_string()))?;
    if let Err(errors) = compiled.validate(&value) {
        let mut msgs = Vec::new();
        for err in errors {
            msgs.push(format!("{} at {}", err, err.instance_path));
            if msgs.len() >= 3 {
                break;
            }
        }
        return Err(
            ChainError::run("structured output does not conform to the schema")
                .with_cause(msgs.join("; ")),
        );
    }
    Ok(value)
}
