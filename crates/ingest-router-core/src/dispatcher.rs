//! Dispatcher.
//!
//! Turns an (event, rule) pair into one [`DispatchAttempt`]: derive the
//! parameters, pick the backend of the rule's kind, and call it within the
//! kind's acknowledgment bound. An elapsed bound is a transient failure; the
//! router stops waiting but never cancels work a backend already accepted.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use ingest_router_model::{
    BackendKind, DispatchAttempt, DispatchError, DispatchHandle, IngestionEvent, RoutingRule,
};

use crate::backend::{Backends, InvocationRequest, execution_name};
use crate::clock::Clock;
use crate::config::RouterConfig;
use crate::params::{extract_params, require_location};

/// Acknowledgment bounds per backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTimeouts {
    /// How long a FastPath call may run.
    pub fast_path: Duration,
    /// How long a workflow start or job submission may wait for acknowledgment.
    pub submit: Duration,
}

impl Default for DispatchTimeouts {
    fn default() -> Self {
        Self {
            fast_path: Duration::from_secs(60),
            submit: Duration::from_secs(10),
        }
    }
}

impl DispatchTimeouts {
    /// Bounds from the process configuration.
    #[must_use]
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            fast_path: config.fast_path_timeout(),
            submit: config.submit_timeout(),
        }
    }

    /// Bound applying to `kind`.
    #[must_use]
    pub fn for_kind(&self, kind: BackendKind) -> Duration {
        if kind.is_synchronous() {
            self.fast_path
        } else {
            self.submit
        }
    }
}

/// A finished attempt with its result.
#[derive(Debug, Clone)]
pub struct CompletedAttempt {
    /// The attempt as recorded, never pending.
    pub attempt: DispatchAttempt,
    /// What the backend returned.
    pub result: Result<DispatchHandle, DispatchError>,
}

/// Invokes backends for matched rules.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    backends: Backends,
    timeouts: DispatchTimeouts,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(backends: Backends, timeouts: DispatchTimeouts, clock: Arc<dyn Clock>) -> Self {
        Self {
            backends,
            timeouts,
            clock,
        }
    }

    /// Registered backends.
    #[must_use]
    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Build the invocation for `rule` without calling anything.
    pub fn prepare(
        &self,
        event: &IngestionEvent,
        rule: &RoutingRule,
    ) -> Result<InvocationRequest, DispatchError> {
        require_location(event)?;
        let parameters = extract_params(&rule.param_template, event)?;
        Ok(InvocationRequest {
            target: rule.target.clone(),
            bucket: event.bucket.clone(),
            key: event.key.clone(),
            parameters,
            idempotency_key: execution_name(&event.event_id, &rule.id),
        })
    }

    /// Run attempt `attempt_number` of the (event, rule) chain.
    pub async fn dispatch(
        &self,
        event: &Arc<IngestionEvent>,
        rule: &Arc<RoutingRule>,
        attempt_number: u32,
    ) -> CompletedAttempt {
        let mut attempt = DispatchAttempt::begin(
            Arc::clone(event),
            Arc::clone(rule),
            attempt_number,
            self.clock.now(),
        );
        let started = Instant::now();
        let result = self.invoke(event, rule).await;
        attempt.complete(result.clone(), started.elapsed());
        debug!(
            event_id = %event.event_id,
            rule_id = %rule.id,
            attempt = attempt_number,
            outcome = ?attempt.outcome,
            latency_ms = u64::try_from(attempt.latency.as_millis()).unwrap_or(u64::MAX),
            "dispatch attempt finished",
        );
        CompletedAttempt { attempt, result }
    }

    async fn invoke(
        &self,
        event: &IngestionEvent,
        rule: &RoutingRule,
    ) -> Result<DispatchHandle, DispatchError> {
        let request = self.prepare(event, rule)?;
        let backend = self
            .backends
            .get(rule.backend_kind)
            .ok_or(DispatchError::NotConfigured(rule.backend_kind))?;
        let bound = self.timeouts.for_kind(rule.backend_kind);
        tokio::time::timeout(bound, backend.call(&request))
            .await
            .unwrap_or(Err(DispatchError::Timeout(bound)))
    }
}

#[cfg(test)]
mod tests {
    use ingest_router_model::{AttemptOutcome, FieldPath, ParamTemplate};

    use super::*;
    use crate::backend::Backend;
    use crate::testing::{ManualClock, ScriptedBackend, orders_event, t0};

    fn dispatcher(backends: Backends) -> Dispatcher {
        Dispatcher::new(backends, DispatchTimeouts::default(), ManualClock::at(t0()))
    }

    #[tokio::test]
    async fn test_should_invoke_fast_path_with_bucket_and_key() {
        let fast = ScriptedBackend::succeeding();
        let dispatcher = dispatcher(Backends::new().with(Backend::FastPath(fast.clone())));
        let event = Arc::new(orders_event());
        let rule = Arc::new(
            RoutingRule::new("csv-fast", BackendKind::FastPath, "ingest-orders")
                .with_prefix("lambda/")
                .with_suffix(".csv"),
        );

        let CompletedAttempt { attempt, result } = dispatcher.dispatch(&event, &rule, 1).await;
        assert_eq!(attempt.outcome, AttemptOutcome::Succeeded);
        assert_eq!(attempt.handle, Some(DispatchHandle::Completed));
        assert_eq!(attempt.started_at, t0());
        assert_eq!(result, Ok(DispatchHandle::Completed));

        let calls = fast.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, "ingest-orders");
        assert_eq!(calls[0].parameters.len(), 2);
        assert_eq!(calls[0].parameters["bucket"], "lz");
        assert_eq!(calls[0].parameters["key"], "lambda/orders.csv");
        assert!(calls[0].idempotency_key.starts_with("evt-1-csv-fast-"));
    }

    #[tokio::test]
    async fn test_should_return_job_handle() {
        let heavy = ScriptedBackend::succeeding();
        let dispatcher = dispatcher(Backends::new().with(Backend::HeavyCompute(heavy)));
        let rule = Arc::new(RoutingRule::new("sat", BackendKind::HeavyCompute, "gpu"));
        let attempt = dispatcher.dispatch(&Arc::new(orders_event()), &rule, 1).await.attempt;
        assert_eq!(
            attempt.handle,
            Some(DispatchHandle::Job {
                job_id: "handle-1".into()
            })
        );
    }

    #[tokio::test]
    async fn test_should_fail_permanently_on_missing_template_field() {
        let batch = ScriptedBackend::succeeding();
        let dispatcher = dispatcher(Backends::new().with(Backend::BatchOrchestration(batch.clone())));
        let rule = Arc::new(
            RoutingRule::new("wf", BackendKind::BatchOrchestration, "etl").with_template(
                ParamTemplate::empty().with("owner", FieldPath::Metadata("owner".into())),
            ),
        );
        let completed = dispatcher.dispatch(&Arc::new(orders_event()), &rule, 1).await;
        assert_eq!(completed.attempt.outcome, AttemptOutcome::Failed);
        assert!(matches!(completed.attempt.failure, Some(DispatchError::MalformedEvent(_))));
        assert!(matches!(completed.result, Err(DispatchError::MalformedEvent(_))));
        assert_eq!(batch.call_count(), 0);
    }

    #[tokio::test]
    async fn test_should_fail_when_backend_not_configured() {
        let dispatcher = dispatcher(Backends::new());
        let rule = Arc::new(RoutingRule::new("wf", BackendKind::BatchOrchestration, "etl"));
        let attempt = dispatcher.dispatch(&Arc::new(orders_event()), &rule, 1).await.attempt;
        assert_eq!(
            attempt.failure,
            Some(DispatchError::NotConfigured(BackendKind::BatchOrchestration))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_time_out_slow_submission() {
        let heavy = ScriptedBackend::slow(Duration::from_secs(30));
        let dispatcher = Dispatcher::new(
            Backends::new().with(Backend::HeavyCompute(heavy)),
            DispatchTimeouts {
                fast_path: Duration::from_secs(60),
                submit: Duration::from_secs(5),
            },
            ManualClock::at(t0()),
        );
        let rule = Arc::new(RoutingRule::new("sat", BackendKind::HeavyCompute, "gpu"));
        let attempt = dispatcher.dispatch(&Arc::new(orders_event()), &rule, 1).await.attempt;
        assert_eq!(attempt.failure, Some(DispatchError::Timeout(Duration::from_secs(5))));
        assert!(attempt.failure.as_ref().is_some_and(DispatchError::is_transient));
    }

    #[test]
    fn test_should_pick_timeout_per_kind() {
        let timeouts = DispatchTimeouts::default();
        assert_eq!(timeouts.for_kind(BackendKind::FastPath), Duration::from_secs(60));
        assert_eq!(timeouts.for_kind(BackendKind::HeavyCompute), Duration::from_secs(10));
        assert_eq!(timeouts.for_kind(BackendKind::BatchOrchestration), Duration::from_secs(10));
    }
}
