//! Model types for the ingestion router.
//!
//! This crate holds the data shared by every layer of the router: the
//! inbound [`IngestionEvent`] (and the S3 notification document it is decoded
//! from), the static [`RoutingRule`] table entries, per-attempt
//! [`DispatchAttempt`] state, [`DeadLetterRecord`]s, the observability
//! [`OutcomeRecord`], and the error taxonomy.

pub mod attempt;
pub mod dead_letter;
pub mod error;
pub mod event;
pub mod operations;
pub mod outcome;
pub mod report;
pub mod rule;
pub mod template;

pub use attempt::{AttemptOutcome, DispatchAttempt, DispatchHandle};
pub use dead_letter::{DeadLetterCause, DeadLetterRecord};
pub use error::{DispatchError, IngestError, IngestErrorCode};
pub use event::{IngestionEvent, S3EventNotification};
pub use operations::IngestOperation;
pub use outcome::{ObservedOutcome, OutcomeRecord};
pub use report::{ChainReport, ChainStatus, EventReport};
pub use rule::{BackendKind, RoutingRule};
pub use template::{FieldPath, ParamTemplate};
