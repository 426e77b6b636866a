//! Tool calling definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-supplied tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's arguments.
    pub parameters: serde_json::Value,
}

/// Tool invocation emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Provider-neutral callable tool, consumed by the streaming backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallableTool {
    pub description: String,
    /// Validated JSON Schema for the arguments.
    pub parameters: serde_json::Value,
}

/// Name-keyed callable tools. `BTreeMap` keeps wire ordering deterministic.
pub type CallableToolMap = BTreeMap<String, CallableTool>;
