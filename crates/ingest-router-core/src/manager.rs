//! Retry and dead-letter manager.
//!
//! Drives one (event, rule) chain to a terminal state:
//!
//! ```text
//! Pending -> Succeeded
//!         -> Retrying -> Pending
//!         -> DeadLettered
//! ```
//!
//! Attempts within a chain run strictly one after another. The age bound is
//! checked before every attempt, so no attempt starts once the event is
//! older than `max_event_age`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use ingest_router_model::{
    ChainReport, ChainStatus, DeadLetterCause, DeadLetterRecord, DispatchAttempt, DispatchError,
    IngestionEvent, ObservedOutcome, OutcomeRecord, RoutingRule,
};

use crate::clock::Clock;
use crate::dead_letter::DeadLetterSink;
use crate::dispatcher::{CompletedAttempt, Dispatcher};
use crate::observe::OutcomeSink;
use crate::retry::{RetryDecision, RetryPolicies};

/// Runs attempt chains and dead-letters the ones that fail.
#[derive(Debug, Clone)]
pub struct RetryManager {
    dispatcher: Dispatcher,
    policies: RetryPolicies,
    dead_letters: Arc<dyn DeadLetterSink>,
    outcomes: Arc<dyn OutcomeSink>,
    clock: Arc<dyn Clock>,
}

/// How a chain gave up.
struct Failure {
    cause: DeadLetterCause,
    reason: String,
    attempts_made: u32,
    last_attempt_at: DateTime<Utc>,
    latency: Duration,
}

impl RetryManager {
    /// Create a manager.
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        policies: RetryPolicies,
        dead_letters: Arc<dyn DeadLetterSink>,
        outcomes: Arc<dyn OutcomeSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dispatcher,
            policies,
            dead_letters,
            outcomes,
            clock,
        }
    }

    /// Dead-letter sink the manager writes to.
    #[must_use]
    pub fn dead_letters(&self) -> &Arc<dyn DeadLetterSink> {
        &self.dead_letters
    }

    /// Run the chain for `rule` until it succeeds or is dead-lettered.
    pub async fn run_chain(&self, event: Arc<IngestionEvent>, rule: Arc<RoutingRule>) -> ChainReport {
        let policy = *self.policies.for_kind(rule.backend_kind);
        let mut attempt_number = 1;
        let mut last_failure: Option<(DispatchError, DispatchAttempt)> = None;

        loop {
            let now = self.clock.now();
            if policy.is_expired(event.created_at, now) {
                let expiry = format!(
                    "event created at {} is older than {}s",
                    event.created_at.to_rfc3339(),
                    policy.max_event_age.as_secs()
                );
                let failure = match last_failure {
                    Some((error, attempt)) => Failure {
                        cause: DeadLetterCause::EventExpired,
                        reason: format!("{error}; {expiry}"),
                        attempts_made: attempt.attempt_number,
                        last_attempt_at: attempt.started_at,
                        latency: attempt.latency,
                    },
                    None => Failure {
                        cause: DeadLetterCause::EventExpired,
                        reason: expiry,
                        attempts_made: 0,
                        last_attempt_at: now,
                        latency: Duration::ZERO,
                    },
                };
                return self.dead_letter(&event, &rule, failure).await;
            }

            let CompletedAttempt { attempt, result } =
                self.dispatcher.dispatch(&event, &rule, attempt_number).await;

            let error = match result {
                Ok(handle) => {
                    self.outcomes.record(OutcomeRecord {
                        event_id: event.event_id.clone(),
                        key: event.key.clone(),
                        rule_id: Some(rule.id.clone()),
                        backend_kind: Some(rule.backend_kind),
                        attempt_number,
                        outcome: ObservedOutcome::Succeeded,
                        latency_ms: millis(attempt.latency),
                        detail: None,
                        recorded_at: self.clock.now(),
                    });
                    return ChainReport {
                        rule_id: rule.id.clone(),
                        backend_kind: rule.backend_kind,
                        attempts: attempt_number,
                        status: ChainStatus::Succeeded { handle },
                    };
                }
                Err(error) => error,
            };

            match policy.after_failure(&error, attempt_number, event.created_at, self.clock.now()) {
                RetryDecision::Retry {
                    next_attempt,
                    delay,
                } => {
                    self.outcomes.record(OutcomeRecord {
                        event_id: event.event_id.clone(),
                        key: event.key.clone(),
                        rule_id: Some(rule.id.clone()),
                        backend_kind: Some(rule.backend_kind),
                        attempt_number,
                        outcome: ObservedOutcome::Retrying,
                        latency_ms: millis(attempt.latency),
                        detail: Some(error.to_string()),
                        recorded_at: self.clock.now(),
                    });
                    debug!(
                        event_id = %event.event_id,
                        rule_id = %rule.id,
                        next_attempt,
                        delay_ms = millis(delay),
                        "retrying dispatch",
                    );
                    tokio::time::sleep(delay).await;
                    attempt_number = next_attempt;
                    last_failure = Some((error, attempt));
                }
                RetryDecision::GiveUp(cause) => {
                    let failure = Failure {
                        cause,
                        reason: error.to_string(),
                        attempts_made: attempt_number,
                        last_attempt_at: attempt.started_at,
                        latency: attempt.latency,
                    };
                    return self.dead_letter(&event, &rule, failure).await;
                }
            }
        }
    }

    async fn dead_letter(
        &self,
        event: &IngestionEvent,
        rule: &RoutingRule,
        failure: Failure,
    ) -> ChainReport {
        let record = DeadLetterRecord {
            original_event: event.clone(),
            rule: rule.clone(),
            failure_reason: failure.reason.clone(),
            cause: failure.cause,
            attempts_made: failure.attempts_made,
            last_attempt_at: failure.last_attempt_at,
        };

        if self.dead_letters.contains(&event.event_id, &rule.id).await {
            debug!(event_id = %event.event_id, rule_id = %rule.id, "chain already dead-lettered");
        } else {
            match self.dead_letters.append(record.clone()).await {
                Ok(true) => info!(
                    event_id = %event.event_id,
                    rule_id = %rule.id,
                    cause = ?failure.cause,
                    attempts = failure.attempts_made,
                    "event dead-lettered",
                ),
                Ok(false) => {
                    debug!(event_id = %event.event_id, rule_id = %rule.id, "chain already dead-lettered");
                }
                Err(e) => error!(
                    event_id = %event.event_id,
                    rule_id = %rule.id,
                    error = %e,
                    record = %serde_json::to_string(&record).unwrap_or_default(),
                    "failed to write dead-letter record",
                ),
            }
        }

        self.outcomes.record(OutcomeRecord {
            event_id: event.event_id.clone(),
            key: event.key.clone(),
            rule_id: Some(rule.id.clone()),
            backend_kind: Some(rule.backend_kind),
            attempt_number: failure.attempts_made,
            outcome: ObservedOutcome::DeadLettered,
            latency_ms: millis(failure.latency),
            detail: Some(failure.reason.clone()),
            recorded_at: self.clock.now(),
        });

        ChainReport {
            rule_id: rule.id.clone(),
            backend_kind: rule.backend_kind,
            attempts: failure.attempts_made,
            status: ChainStatus::DeadLettered {
                cause: failure.cause,
                reason: failure.reason,
            },
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
