//! Tool registry builder.
//!
//! Converts caller tool definitions into the provider-neutral callable map
//! the streaming backend consumes. The build fails closed: one malformed
//! entry fails the whole build, never a partial map.

use crate::error::ChainError;
use crate::types::tool::{CallableTool, CallableToolMap, ToolDefinition};
use crate::Result;
use schemars::JsonSchema;

/// Derive a JSON Schema for a Rust type, for use as tool parameters or as a
/// structured-output schema.
pub fn schema_for_type<T: JsonSchema>() -> Result<serde_json::Value> {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema).map_err(ChainError::from)
}

/// Build the callable-tool map from caller definitions.
///
/// An empty slice yields an empty map; tool support is optional per call.
pub fn build_registry(definitions: &[ToolDefinition]) -> Result<CallableToolMap> {
    let mut registry = CallableToolMap::new();

    for def in definitions {
        let name = def.name.trim();
        if name.is_empty() {
            return Err(ChainError::run(
                "tool registry build failed: tool name must not be empty",
            ));
        }
        if registry.contains_key(name) {
            return Err(ChainError::run(format!(
                "tool registry build failed: duplicate tool '{name}'"
            )));
        }
        if !def.parameters.is_object() {
            return Err(ChainError::run(format!(
                "tool registry build failed: tool '{name}': parameter schema must be a JSON object"
            )));
        }
        if let Err(e) = jsonschema::JSONSchema::compile(&def.parameters) {
            return Err(ChainError::run(format!(
                "tool registry build failed: tool '{name}': invalid parameter schema"
            ))
            .with_cause(e.to_string()));
        }

        registry.insert(
            name.to_string(),
            CallableTool {
                description: def.description.clone().unwrap_or_default(),
                parameters: def.parameters.clone(),
            },
        );
    }

    Ok(registry)
}
