//! Provider compatibility rules.
//!
//! Rules are provider-scoped, pure transformations and validations applied
//! before dispatch. All applicable rules run; violations accumulate rather
//! than short-circuiting, so callers receive a complete diagnostic list.
//! When any violation is present the transformed messages/config must be
//! discarded by the caller.

mod providers;

pub use providers::default_rules;

use crate::provider::ProviderKind;
use crate::request::GenerationConfig;
use crate::types::message::Message;

/// A single diagnostic produced by a failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleViolation {
    pub message: String,
}

impl RuleViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One provider-scoped compatibility check or rewrite. Pure: no I/O, no
/// randomness; identical inputs produce identical outputs.
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    fn applies_to(&self, kind: ProviderKind) -> bool;

    fn apply(
        &self,
        messages: &mut Vec<Message>,
        config: &mut GenerationConfig,
        violations: &mut Vec<RuleViolation>,
    );
}

/// Output of a full rule pass.
#[derive(Debug, Clone)]
pub struct RuleReport {
    pub messages: Vec<Message>,
    pub config: GenerationConfig,
    pub violations: Vec<RuleViolation>,
}

impl RuleReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Runs every applicable rule over a cloned `(messages, config)` pair.
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_rules())
    }

    pub fn apply(
        &self,
        kind: ProviderKind,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> RuleReport {
        let mut messages = messages.to_vec();
        let mut config = config.clone();
        let mut violations = Vec::new();

        for rule in self.rules.iter().filter(|r| r.applies_to(kind)) {
            rule.apply(&mut messages, &mut config, &mut violations);
        }

        RuleReport {
            messages,
            config,
            violations,
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
