//! The routing pipeline.
//!
//! [`IngestRouter`] ties the pieces together: match an event against the
//! rule table, run one attempt chain per matching rule, and report the
//! terminal state of each chain. Chains of one event run concurrently with
//! one another; an event that matches nothing is dropped with a `NoMatch`
//! record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use ingest_router_model::{DeadLetterRecord, EventReport, IngestionEvent, OutcomeRecord};

use crate::backend::Backends;
use crate::clock::{Clock, SystemClock};
use crate::dead_letter::{DeadLetterSink, InMemoryDeadLetterStore};
use crate::dispatcher::{DispatchTimeouts, Dispatcher};
use crate::error::{RouterError, RouterResult};
use crate::manager::RetryManager;
use crate::matcher::RuleTable;
use crate::observe::{OutcomeSink, TracingOutcomeSink};
use crate::retry::RetryPolicies;

/// Components the router is assembled from.
#[derive(Debug, TypedBuilder)]
pub struct RouterParts {
    /// Validated rule table.
    rules: RuleTable,
    /// Backend adapters.
    backends: Backends,
    /// Retry policies.
    #[builder(default)]
    policies: RetryPolicies,
    /// Acknowledgment bounds.
    #[builder(default)]
    timeouts: DispatchTimeouts,
    /// Dead-letter sink.
    #[builder(default = Arc::new(InMemoryDeadLetterStore::new()) as Arc<dyn DeadLetterSink>)]
    dead_letters: Arc<dyn DeadLetterSink>,
    /// Outcome sink.
    #[builder(default = Arc::new(TracingOutcomeSink) as Arc<dyn OutcomeSink>)]
    outcomes: Arc<dyn OutcomeSink>,
    /// Time source.
    #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)]
    clock: Arc<dyn Clock>,
}

impl RouterParts {
    /// Validate the parts and build the router.
    ///
    /// Every rule must target a backend kind that has an adapter.
    pub fn into_router(self) -> RouterResult<IngestRouter> {
        for rule in self.rules.rules() {
            if !self.backends.contains(rule.backend_kind) {
                return Err(RouterError::BackendMissing {
                    rule: rule.id.clone(),
                    kind: rule.backend_kind,
                });
            }
        }
        self.policies.validate()?;

        let dispatcher = Dispatcher::new(self.backends, self.timeouts, Arc::clone(&self.clock));
        let manager = RetryManager::new(
            dispatcher,
            self.policies,
            self.dead_letters,
            Arc::clone(&self.outcomes),
            Arc::clone(&self.clock),
        );
        info!(rules = self.rules.len(), "router ready");
        Ok(IngestRouter {
            rules: self.rules,
            manager,
            outcomes: self.outcomes,
            clock: self.clock,
        })
    }
}

/// Routes ingestion events to their backends.
#[derive(Debug, Clone)]
pub struct IngestRouter {
    rules: RuleTable,
    manager: RetryManager,
    outcomes: Arc<dyn OutcomeSink>,
    clock: Arc<dyn Clock>,
}

impl IngestRouter {
    /// Rule table in use.
    #[must_use]
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Dead-letter sink in use.
    #[must_use]
    pub fn dead_letters(&self) -> &Arc<dyn DeadLetterSink> {
        self.manager.dead_letters()
    }

    /// Current time on the router's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Route one event through every matching rule.
    pub async fn route(&self, event: IngestionEvent) -> EventReport {
        let matched = self.rules.match_event(&event);
        if matched.is_empty() {
            debug!(event_id = %event.event_id, key = %event.key, "no rule matched");
            self.outcomes.record(OutcomeRecord::no_match(&event, self.clock.now()));
            return EventReport {
                event_id: event.event_id,
                key: event.key,
                matched_rules: Vec::new(),
                chains: Vec::new(),
            };
        }

        let event = Arc::new(event);
        debug!(
            event_id = %event.event_id,
            key = %event.key,
            rules = matched.len(),
            "routing event",
        );
        let chains = join_all(
            matched
                .iter()
                .map(|rule| self.manager.run_chain(Arc::clone(&event), Arc::clone(rule))),
        )
        .await;

        EventReport {
            event_id: event.event_id.clone(),
            key: event.key.clone(),
            matched_rules: matched.iter().map(|rule| rule.id.clone()).collect(),
            chains,
        }
    }

    /// Route a batch of events concurrently, reporting in input order.
    pub async fn route_all(&self, events: Vec<IngestionEvent>) -> Vec<EventReport> {
        join_all(events.into_iter().map(|event| self.route(event))).await
    }

    /// Re-feed a dead-lettered event through the full pipeline.
    ///
    /// The event is matched afresh, so every rule it matches today runs, not
    /// only the rule recorded in `record`.
    pub async fn replay(&self, record: DeadLetterRecord) -> EventReport {
        info!(
            event_id = %record.original_event.event_id,
            rule_id = %record.rule.id,
            cause = ?record.cause,
            "replaying dead-lettered event",
        );
        self.route(record.original_event).await
    }
}
