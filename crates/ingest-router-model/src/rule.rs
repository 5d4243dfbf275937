//! Routing rules and backend kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::template::ParamTemplate;

/// Category of downstream worker, distinguished by latency profile and
/// completion-reporting model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    /// Low-latency synchronous transform; completion within the call is success.
    #[serde(alias = "FastPath")]
    FastPath,
    /// Multi-step workflow; success is a successful workflow start.
    #[serde(alias = "BatchOrchestration")]
    BatchOrchestration,
    /// Long-running job on a capacity-bounded queue; success is a successful submission.
    #[serde(alias = "HeavyCompute")]
    HeavyCompute,
}

impl BackendKind {
    /// All backend kinds, in declaration order.
    pub const ALL: [Self; 3] = [Self::FastPath, Self::BatchOrchestration, Self::HeavyCompute];

    /// Returns the wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FastPath => "fastPath",
            Self::BatchOrchestration => "batchOrchestration",
            Self::HeavyCompute => "heavyCompute",
        }
    }

    /// Whether the dispatch blocks until the backend finishes the work.
    #[must_use]
    pub fn is_synchronous(&self) -> bool {
        matches!(self, Self::FastPath)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A static routing rule.
///
/// A rule matches an event when the object key starts with `key_prefix`
/// (if set) and ends with `key_suffix` (if set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    /// Unique rule identifier.
    pub id: String,
    /// Required key prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
    /// Required key suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_suffix: Option<String>,
    /// Backend that handles matching events.
    pub backend_kind: BackendKind,
    /// Backend resource addressed: function, workflow or job queue name.
    pub target: String,
    /// Parameter name to event field extraction.
    #[serde(default)]
    pub param_template: ParamTemplate,
}

impl RoutingRule {
    /// Create a rule with the default `(bucket, key)` template.
    #[must_use]
    pub fn new(id: impl Into<String>, backend_kind: BackendKind, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key_prefix: None,
            key_suffix: None,
            backend_kind,
            target: target.into(),
            param_template: ParamTemplate::default(),
        }
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Set the key suffix.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.key_suffix = Some(suffix.into());
        self
    }

    /// Replace the parameter template.
    #[must_use]
    pub fn with_template(mut self, template: ParamTemplate) -> Self {
        self.param_template = template;
        self
    }
}
