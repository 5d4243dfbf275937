//! Per-event routing reports returned to callers.

use serde::{Deserialize, Serialize};

use crate::attempt::DispatchHandle;
use crate::dead_letter::DeadLetterCause;
use crate::rule::BackendKind;

/// Terminal state of an attempt chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ChainStatus {
    /// The backend accepted the work.
    Succeeded {
        /// Handle returned by the backend.
        handle: DispatchHandle,
    },
    /// The chain was written to the dead-letter store.
    #[serde(rename_all = "camelCase")]
    DeadLettered {
        /// Terminal failure classification.
        cause: DeadLetterCause,
        /// Reason of the last failure.
        reason: String,
    },
}

/// Result of one (event, rule) chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    /// Rule identifier.
    pub rule_id: String,
    /// Backend kind of the rule.
    pub backend_kind: BackendKind,
    /// Attempts made.
    pub attempts: u32,
    /// Terminal status.
    #[serde(flatten)]
    pub status: ChainStatus,
}

impl ChainReport {
    /// Whether the chain reached its backend.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, ChainStatus::Succeeded { .. })
    }
}

/// Result of routing one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReport {
    /// Event identifier.
    pub event_id: String,
    /// Object key.
    pub key: String,
    /// Matched rules, in configuration order.
    pub matched_rules: Vec<String>,
    /// One report per matched rule, in configuration order.
    pub chains: Vec<ChainReport>,
}

impl EventReport {
    /// Whether the event matched no rule.
    #[must_use]
    pub fn is_no_match(&self) -> bool {
        self.matched_rules.is_empty()
    }

    /// Number of chains that ended dead-lettered.
    #[must_use]
    pub fn dead_lettered(&self) -> usize {
        self.chains.iter().filter(|c| !c.is_success()).count()
    }
}
