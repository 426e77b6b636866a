//! Core type definitions: messages, stream chunks, tools, token usage.

pub mod chunk;
pub mod message;
pub mod tool;
pub mod usage;

pub use chunk::StreamChunk;
pub use message::{ContentBlock, Message, MessageContent, MessageRole};
pub use tool::{CallableTool, CallableToolMap, ToolCall, ToolDefinition};
pub use usage::TokenUsage;
