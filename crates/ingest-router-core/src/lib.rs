//! Routing core for the ingestion router.
//!
//! An [`IngestRouter`] matches each [`IngestionEvent`](ingest_router_model::IngestionEvent)
//! against an ordered [`RuleTable`], dispatches one attempt chain per matching
//! rule to the rule's backend kind, retries transient failures under a
//! [`RetryPolicy`], and writes chains that end in failure to a
//! [`DeadLetterSink`]. Every attempt outcome is reported to an [`OutcomeSink`].
//!
//! [`RouterHandler`] exposes the router over the HTTP layer of
//! `ingest-router-http`.

pub mod backend;
pub mod clock;
pub mod config;
pub mod dead_letter;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod manager;
pub mod matcher;
pub mod observe;
pub mod params;
pub mod retry;
pub mod router;

#[cfg(test)]
mod testing;

pub use backend::{Backend, Backends, InvocationRequest};
pub use clock::{Clock, SystemClock};
pub use config::{RouterConfig, RulesDocument};
pub use dead_letter::{DeadLetterSink, FileDeadLetterStore, InMemoryDeadLetterStore};
pub use dispatcher::{CompletedAttempt, DispatchTimeouts, Dispatcher};
pub use error::{RouterError, RouterResult};
pub use handler::RouterHandler;
pub use manager::RetryManager;
pub use matcher::RuleTable;
pub use observe::{MemoryOutcomeSink, OutcomeSink, TracingOutcomeSink};
pub use retry::{RetryDecision, RetryPolicies, RetryPolicy};
pub use router::{IngestRouter, RouterParts};
