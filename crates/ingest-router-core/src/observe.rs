//! Observability sinks.
//!
//! One [`OutcomeRecord`] is emitted per attempt outcome and one per event
//! that matched no rule.

use std::fmt;

use parking_lot::Mutex;
use tracing::{info, warn};

use ingest_router_model::{ObservedOutcome, OutcomeRecord};

/// Destination for outcome records.
pub trait OutcomeSink: Send + Sync + fmt::Debug {
    /// Emit one record.
    fn record(&self, record: OutcomeRecord);
}

/// Emits every record as a `tracing` event on the `ingest_router::outcome` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingOutcomeSink;

impl OutcomeSink for TracingOutcomeSink {
    fn record(&self, record: OutcomeRecord) {
        let rule_id = record.rule_id.as_deref().unwrap_or("-");
        let backend_kind = record.backend_kind.map_or("-", |kind| kind.as_str());
        let detail = record.detail.as_deref().unwrap_or("");
        match record.outcome {
            ObservedOutcome::Succeeded | ObservedOutcome::NoMatch => info!(
                target: "ingest_router::outcome",
                event_id = %record.event_id,
                key = %record.key,
                rule_id,
                backend_kind,
                attempt = record.attempt_number,
                outcome = %record.outcome,
                latency_ms = record.latency_ms,
                detail,
                "dispatch outcome",
            ),
            ObservedOutcome::Retrying | ObservedOutcome::DeadLettered => warn!(
                target: "ingest_router::outcome",
                event_id = %record.event_id,
                key = %record.key,
                rule_id,
                backend_kind,
                attempt = record.attempt_number,
                outcome = %record.outcome,
                latency_ms = record.latency_ms,
                detail,
                "dispatch outcome",
            ),
        }
    }
}

/// Keeps records in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryOutcomeSink {
    records: Mutex<Vec<OutcomeRecord>>,
}

impl MemoryOutcomeSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record so far.
    #[must_use]
    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.records.lock().clone()
    }

    /// Records with the given outcome.
    #[must_use]
    pub fn with_outcome(&self, outcome: ObservedOutcome) -> Vec<OutcomeRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.outcome == outcome)
            .cloned()
            .collect()
    }
}

impl OutcomeSink for MemoryOutcomeSink {
    fn record(&self, record: OutcomeRecord) {
        self.records.lock().push(record);
    }
}
