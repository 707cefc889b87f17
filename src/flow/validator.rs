use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flow::types::Flow;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingKind {
    Error,
    Warning,
    Info,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationFinding {
    pub kind: FindingKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

impl ValidationFinding {
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            node: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FindingKind::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FindingKind::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(FindingKind::Info, message)
    }

    pub fn on_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == FindingKind::Error
    }
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FindingKind::Error => "ERROR",
            FindingKind::Warning => "WARNING",
            FindingKind::Info => "INFO",
        };
        match &self.node {
            Some(node) => write!(f, "{kind} [{node}] {}", self.message),
            None => write!(f, "{kind} {}", self.message),
        }
    }
}

/// A check run over a flow before it is compiled.
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, flow: &Flow) -> Vec<ValidationFinding>;
}

/// Ordered set of rules. The default validator has no rules and reports nothing.
#[derive(Clone, Default)]
pub struct FlowValidator {
    rules: Vec<Arc<dyn ValidationRule>>,
}

impl FlowValidator {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: Arc<dyn ValidationRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn validate_model(&self, flow: &Flow) -> Vec<ValidationFinding> {
        self.rules
            .iter()
            .flat_map(|rule| {
                let findings = rule.check(flow);
                if !findings.is_empty() {
                    tracing::debug!(rule = rule.name(), count = findings.len(), "validation findings");
                }
                findings
            })
            .collect()
    }
}

impl fmt::Debug for FlowValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowValidator")
            .field("rules", &self.rule_names())
            .finish()
    }
}
