//! # chaincall
//!
//! Provider-agnostic LLM invocation orchestration with first-class
//! streaming.
//!
//! One [`Orchestrator::run`] call validates the request against
//! provider-scoped compatibility rules, builds the callable tool registry,
//! resolves the provider adapter, dispatches through an injectable
//! streaming backend and hands back a tagged [`InvocationResult`]. Every
//! result exposes the same duality: the full chunk stream, and eventual
//! fields (`text`, `object`, `usage`, ...) that can be awaited without
//! draining the stream.
//!
//! ```no_run
//! use chaincall::{
//!     GenerationConfig, GenerationRequest, Message, Orchestrator, ProviderDescriptor,
//!     ProviderKind,
//! };
//!
//! # async fn demo() -> chaincall::Result<()> {
//! let orchestrator = Orchestrator::new();
//! let request = GenerationRequest::builder(
//!     ProviderDescriptor::new(ProviderKind::Openai, "sk-..."),
//!     GenerationConfig::for_model("gpt-4o-mini"),
//! )
//! .message(Message::user("Say hello."))
//! .build()?;
//!
//! let result = orchestrator.run(request).await?;
//! if let chaincall::InvocationResult::Text(text) = result {
//!     println!("{}", text.text.get().await?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod request;
pub mod result;
pub mod rules;
pub mod stream;
pub mod tools;
pub mod types;

use futures::Stream;
use std::pin::Pin;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, error::ChainError>;

/// Boxed stream alias used across the crate.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// A live invocation's chunk stream.
pub type ChunkStream = BoxStream<'static, types::chunk::StreamChunk>;

pub use backend::{HttpBackend, ObjectCall, RawInvocation, StreamingBackend, TextCall};
pub use error::{ChainError, ErrorKind};
pub use orchestrator::Orchestrator;
pub use provider::{AdapterOptions, LanguageModelHandle, ProviderDescriptor, ProviderKind};
pub use request::{GenerationConfig, GenerationRequest, OutputMode, RequestBuilder};
pub use result::{InvocationResult, ObjectInvocation, TextInvocation};
pub use rules::{Rule, RuleEngine, RuleReport, RuleViolation};
pub use stream::{Eventual, SmoothConfig};
pub use tools::{build_registry, schema_for_type};
pub use types::chunk::StreamChunk;
pub use types::message::{ContentBlock, Message, MessageContent, MessageRole};
pub use types::tool::{CallableTool, CallableToolMap, ToolCall, ToolDefinition};
pub use types::usage::TokenUsage;
