//! Dead-letter records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::IngestionEvent;
use crate::rule::RoutingRule;

/// Why a chain was dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeadLetterCause {
    /// Parameter extraction could not proceed.
    MalformedEvent,
    /// The backend refused the request, or no backend is configured.
    Rejected,
    /// Transient failures used up the attempt budget.
    RetryExhausted,
    /// The event aged past the retry window.
    EventExpired,
}

/// Durable record of a chain that never reached its backend.
///
/// Holds the original event verbatim, never the derived parameters, so a
/// replay re-runs matching and dispatch unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterRecord {
    /// The event as received.
    pub original_event: IngestionEvent,
    /// The rule whose chain failed.
    pub rule: RoutingRule,
    /// Human-readable reason of the last failure.
    pub failure_reason: String,
    /// Classification of the terminal failure.
    pub cause: DeadLetterCause,
    /// Attempts made before giving up.
    pub attempts_made: u32,
    /// When the last attempt was made (or the chain was abandoned).
    pub last_attempt_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    /// Store key: event id, then rule id.
    #[must_use]
    pub fn chain_key(&self) -> (&str, &str) {
        (&self.original_event.event_id, &self.rule.id)
    }
}
