//! Observability records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::IngestionEvent;
use crate::rule::BackendKind;

/// Outcome reported to the observability sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObservedOutcome {
    /// The attempt succeeded; the chain is done.
    Succeeded,
    /// The attempt failed and another attempt follows.
    Retrying,
    /// The chain was dead-lettered.
    DeadLettered,
    /// The event matched no rule and was dropped.
    NoMatch,
}

impl ObservedOutcome {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Retrying => "retrying",
            Self::DeadLettered => "deadLettered",
            Self::NoMatch => "noMatch",
        }
    }
}

impl fmt::Display for ObservedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured record per dispatch outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    /// Event identifier.
    pub event_id: String,
    /// Object key.
    pub key: String,
    /// Matched rule, absent for `NoMatch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Backend kind, absent for `NoMatch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_kind: Option<BackendKind>,
    /// Attempt number; 0 when no attempt was made.
    pub attempt_number: u32,
    /// Outcome.
    pub outcome: ObservedOutcome,
    /// Attempt latency in milliseconds.
    pub latency_ms: u64,
    /// Failure detail, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// When the record was produced.
    pub recorded_at: DateTime<Utc>,
}

impl OutcomeRecord {
    /// Record for an event that matched no rule.
    #[must_use]
    pub fn no_match(event: &IngestionEvent, recorded_at: DateTime<Utc>) -> Self {
        Self {
            event_id: event.event_id.clone(),
            key: event.key.clone(),
            rule_id: None,
            backend_kind: None,
            attempt_number: 0,
            outcome: ObservedOutcome::NoMatch,
            latency_ms: 0,
            detail: None,
            recorded_at,
        }
    }
}
