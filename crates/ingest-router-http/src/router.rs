//! Request router.
//!
//! The router exposes four routes:
//!
//! ```text
//! POST /events                 -> IngestEvents
//! POST /replay                 -> Replay
//! GET  /dead-letters?eventId=  -> ListDeadLetters
//! GET  /health, /_health       -> Health
//! ```
//!
//! A trailing slash is ignored. Known paths with the wrong method yield 405,
//! anything else 404.

use ingest_router_model::{IngestError, IngestOperation};

/// Resolve an operation from the request method and path.
pub fn resolve_operation(
    method: &http::Method,
    path: &str,
) -> Result<IngestOperation, IngestError> {
    let normalized = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };

    let op = match normalized {
        "/events" => IngestOperation::IngestEvents,
        "/replay" => IngestOperation::Replay,
        "/dead-letters" => IngestOperation::ListDeadLetters,
        "/health" | "/_health" => IngestOperation::Health,
        _ => return Err(IngestError::not_found(path)),
    };

    let allowed = match op {
        IngestOperation::Health | IngestOperation::ListDeadLetters => {
            *method == http::Method::GET || *method == http::Method::HEAD
        }
        IngestOperation::IngestEvents | IngestOperation::Replay => *method == http::Method::POST,
    };

    if allowed {
        Ok(op)
    } else {
        Err(IngestError::method_not_allowed(method, path))
    }
}
