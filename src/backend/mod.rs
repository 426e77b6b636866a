//! Injectable streaming backend.
//!
//! The backend is the lower-level capability that actually performs the
//! provider call. It is a trait so tests and embedders can substitute the
//! production HTTP implementation with a stub; the orchestrator takes it as
//! a capability parameter, never as a global.

pub mod http;

pub use http::HttpBackend;

use crate::provider::LanguageModelHandle;
use crate::request::OutputMode;
use crate::types::message::Message;
use crate::types::tool::CallableToolMap;
use crate::ChunkStream;
use crate::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Parameters for a free-text streaming call.
#[derive(Debug)]
pub struct TextCall {
    pub handle: LanguageModelHandle,
    pub messages: Vec<Message>,
    pub prompt: Option<String>,
    pub tools: CallableToolMap,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub provider_options: serde_json::Map<String, serde_json::Value>,
    /// When false the backend stays silent; no dispatch logging.
    pub telemetry: bool,
    pub cancel: CancellationToken,
}

/// Parameters for a schema-constrained streaming call.
#[derive(Debug)]
pub struct ObjectCall {
    pub handle: LanguageModelHandle,
    pub messages: Vec<Message>,
    pub prompt: Option<String>,
    pub schema: serde_json::Value,
    pub output_mode: OutputMode,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub provider_options: serde_json::Map<String, serde_json::Value>,
    /// When false the backend stays silent; no dispatch logging.
    pub telemetry: bool,
    pub cancel: CancellationToken,
}

/// A live provider call: one lazily-consumed chunk stream.
pub struct RawInvocation {
    pub chunks: ChunkStream,
}

impl RawInvocation {
    pub fn new(chunks: ChunkStream) -> Self {
        Self { chunks }
    }
}

impl std::fmt::Debug for RawInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawInvocation").finish_non_exhaustive()
    }
}

/// The streaming capability the orchestrator dispatches through.
///
/// Both entry points return quickly with a live stream; the expensive work
/// happens while the stream is consumed. Implementations must honor the
/// call's cancellation token by terminating the stream.
#[async_trait]
pub trait StreamingBackend: Send + Sync {
    async fn stream_text(&self, call: TextCall) -> Result<RawInvocation>;

    async fn stream_object(&self, call: ObjectCall) -> Result<RawInvocation>;
}
