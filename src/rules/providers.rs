//! Concrete provider-scoped rules.

use super::{Rule, RuleViolation};
use crate::provider::ProviderKind;
use crate::request::GenerationConfig;
use crate::types::message::{ContentBlock, Message, MessageContent, MessageRole};

/// The default rule set, in application order.
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ModelPresent),
        Box::new(AnthropicSystemHoist),
        Box::new(AnthropicFirstTurnIsUser),
        Box::new(AnthropicTemperatureClamp),
        Box::new(GoogleToolResultRewrite),
        Box::new(GoogleMergeAdjacentRoles),
        Box::new(OpenAiToolResultIds),
    ]
}

fn is_openai_family(kind: ProviderKind) -> bool {
    matches!(
        kind,
        ProviderKind::Openai
            | ProviderKind::Groq
            | ProviderKind::Mistral
            | ProviderKind::OpenaiCompatible
    )
}

/// All providers: a model identifier is mandatory.
pub struct ModelPresent;

impl Rule for ModelPresent {
    fn name(&self) -> &'static str {
        "model-present"
    }

    fn applies_to(&self, _kind: ProviderKind) -> bool {
        true
    }

    fn apply(
        &self,
        _messages: &mut Vec<Message>,
        config: &mut GenerationConfig,
        violations: &mut Vec<RuleViolation>,
    ) {
        if config.model.trim().is_empty() {
            violations.push(RuleViolation::new("model identifier must not be empty"));
        }
    }
}

/// Anthropic: system messages are a separate top-level field on the wire, so
/// they are hoisted to the front; an empty system message is rejected.
pub struct AnthropicSystemHoist;

impl Rule for AnthropicSystemHoist {
    fn name(&self) -> &'static str {
        "anthropic-system-hoist"
    }

    fn applies_to(&self, kind: ProviderKind) -> bool {
        kind == ProviderKind::Anthropic
    }

    fn apply(
        &self,
        messages: &mut Vec<Message>,
        _config: &mut GenerationConfig,
        violations: &mut Vec<RuleViolation>,
    ) {
        for m in messages.iter() {
            if m.role == MessageRole::System && m.content.is_empty() {
                violations.push(RuleViolation::new(
                    "anthropic: system message must not be empty",
                ));
            }
        }

        // Stable partition: system messages first, relative order kept.
        let (system, rest): (Vec<_>, Vec<_>) = messages
            .drain(..)
            .partition(|m| m.role == MessageRole::System);
        messages.extend(system);
        messages.extend(rest);
    }
}

/// Anthropic: the first non-system message must come from the user.
pub struct AnthropicFirstTurnIsUser;

impl Rule for AnthropicFirstTurnIsUser {
    fn name(&self) -> &'static str {
        "anthropic-first-turn-is-user"
    }

    fn applies_to(&self, kind: ProviderKind) -> bool {
        kind == ProviderKind::Anthropic
    }

    fn apply(
        &self,
        messages: &mut Vec<Message>,
        _config: &mut GenerationConfig,
        violations: &mut Vec<RuleViolation>,
    ) {
        if let Some(first) = messages.iter().find(|m| m.role != MessageRole::System) {
            if first.role != MessageRole::User {
                violations.push(RuleViolation::new(
                    "anthropic: conversation must open with a user message",
                ));
            }
        }
    }
}

/// Anthropic: temperature is bounded to [0, 1]; out-of-range values are
/// clamped rather than rejected.
pub struct AnthropicTemperatureClamp;

impl Rule for AnthropicTemperatureClamp {
    fn name(&self) -> &'static str {
        "anthropic-temperature-clamp"
    }

    fn applies_to(&self, kind: ProviderKind) -> bool {
        kind == ProviderKind::Anthropic
    }

    fn apply(
        &self,
        _messages: &mut Vec<Message>,
        config: &mut GenerationConfig,
        _violations: &mut Vec<RuleViolation>,
    ) {
        if let Some(t) = config.temperature {
            config.temperature = Some(t.clamp(0.0, 1.0));
        }
    }
}

/// Google: there is no dedicated tool role on the wire; tool results travel
/// as user turns carrying tool_result blocks.
pub struct GoogleToolResultRewrite;

impl Rule for GoogleToolResultRewrite {
    fn name(&self) -> &'static str {
        "google-tool-result-rewrite"
    }

    fn applies_to(&self, kind: ProviderKind) -> bool {
        kind == ProviderKind::Google
    }

    fn apply(
        &self,
        messages: &mut Vec<Message>,
        _config: &mut GenerationConfig,
        violations: &mut Vec<RuleViolation>,
    ) {
        for (i, m) in messages.iter_mut().enumerate() {
            if m.role != MessageRole::Tool {
                continue;
            }
            let Some(id) = m.tool_call_id.clone() else {
                violations.push(RuleViolation::new(format!(
                    "tool result at position {i} is missing tool_call_id"
                )));
                continue;
            };
            if let MessageContent::Text(text) = &m.content {
                m.content = MessageContent::Blocks(vec![ContentBlock::ToolResult {
                    tool_use_id: id,
                    content: serde_json::Value::String(text.clone()),
                }]);
            }
            m.role = MessageRole::User;
        }
    }
}

/// Google: adjacent messages with the same role are rejected by the API, so
/// adjacent text messages are merged into one turn.
pub struct GoogleMergeAdjacentRoles;

impl Rule for GoogleMergeAdjacentRoles {
    fn name(&self) -> &'static str {
        "google-merge-adjacent-roles"
    }

    fn applies_to(&self, kind: ProviderKind) -> bool {
        kind == ProviderKind::Google
    }

    fn apply(
        &self,
        messages: &mut Vec<Message>,
        _config: &mut GenerationConfig,
        _violations: &mut Vec<RuleViolation>,
    ) {
        let mut merged: Vec<Message> = Vec::with_capacity(messages.len());
        for m in messages.drain(..) {
            match merged.last_mut() {
                Some(prev)
                    if prev.role == m.role && prev.is_text_only() && m.is_text_only() =>
                {
                    let joined = format!("{}\n{}", prev.text(), m.text());
                    prev.content = MessageContent::Text(joined);
                }
                _ => merged.push(m),
            }
        }
        *messages = merged;
    }
}

/// OpenAI family: a tool-role message must carry the id of the call it
/// answers, and must directly follow the assistant turn that issued it.
pub struct OpenAiToolResultIds;

impl Rule for OpenAiToolResultIds {
    fn name(&self) -> &'static str {
        "openai-tool-result-ids"
    }

    fn applies_to(&self, kind: ProviderKind) -> bool {
        is_openai_family(kind)
    }

    fn apply(
        &self,
        messages: &mut Vec<Message>,
        _config: &mut GenerationConfig,
        violations: &mut Vec<RuleViolation>,
    ) {
        for (i, m) in messages.iter().enumerate() {
            if m.role != MessageRole::Tool {
                continue;
            }
            if m.tool_call_id.as_deref().unwrap_or("").is_empty() {
                violations.push(RuleViolation::new(format!(
                    "tool result at position {i} is missing tool_call_id"
                )));
            }
            let follows_tool_turn = i > 0
                && match &messages[i - 1] {
                    prev if prev.role == MessageRole::Tool => true,
                    prev if prev.role == MessageRole::Assistant => match &prev.content {
                        MessageContent::Blocks(bs) => {
                            bs.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }))
                        }
                        MessageContent::Text(_) => false,
                    },
                    _ => false,
                };
            if !follows_tool_turn {
                violations.push(RuleViolation::new(format!(
                    "tool result at position {i} must follow the assistant tool call it answers"
                )));
            }
        }
    }
}
