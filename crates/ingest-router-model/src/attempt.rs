//! Dispatch attempts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::event::IngestionEvent;
use crate::rule::RoutingRule;

/// Outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttemptOutcome {
    /// Invocation in flight.
    Pending,
    /// Backend accepted (or, for FastPath, completed) the work.
    Succeeded,
    /// Invocation failed.
    Failed,
}

/// What a successful invocation hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum DispatchHandle {
    /// Synchronous FastPath completion.
    Completed,
    /// BatchOrchestration workflow execution.
    #[serde(rename_all = "camelCase")]
    Workflow {
        /// Execution identifier assigned by the workflow engine.
        execution_id: String,
    },
    /// HeavyCompute job.
    #[serde(rename_all = "camelCase")]
    Job {
        /// Job identifier assigned by the execution queue.
        job_id: String,
    },
}

/// One attempt to hand an event to the backend of one rule.
///
/// Attempts of a chain share the same `event` and `rule`; attempt `n + 1`
/// is created only after attempt `n` has left [`AttemptOutcome::Pending`].
#[derive(Debug, Clone)]
pub struct DispatchAttempt {
    /// Event being dispatched.
    pub event: Arc<IngestionEvent>,
    /// Rule the event matched.
    pub rule: Arc<RoutingRule>,
    /// 1-based attempt number within the chain.
    pub attempt_number: u32,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// Current outcome.
    pub outcome: AttemptOutcome,
    /// Handle returned on success.
    pub handle: Option<DispatchHandle>,
    /// Failure on [`AttemptOutcome::Failed`].
    pub failure: Option<DispatchError>,
    /// Time from start to outcome.
    pub latency: Duration,
}

impl DispatchAttempt {
    /// Start a pending attempt.
    #[must_use]
    pub fn begin(
        event: Arc<IngestionEvent>,
        rule: Arc<RoutingRule>,
        attempt_number: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        debug_assert!(attempt_number >= 1, "attempt numbers start at 1");
        Self {
            event,
            rule,
            attempt_number,
            started_at,
            outcome: AttemptOutcome::Pending,
            handle: None,
            failure: None,
            latency: Duration::ZERO,
        }
    }

    /// Record the invocation result.
    pub fn complete(&mut self, result: Result<DispatchHandle, DispatchError>, latency: Duration) {
        self.latency = latency;
        match result {
            Ok(handle) => {
                self.outcome = AttemptOutcome::Succeeded;
                self.handle = Some(handle);
            }
            Err(err) => {
                self.outcome = AttemptOutcome::Failed;
                self.failure = Some(err);
            }
        }
    }

    /// Whether the attempt is still in flight.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.outcome == AttemptOutcome::Pending
    }
}
