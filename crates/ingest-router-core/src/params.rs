//! Parameter derivation.
//!
//! Applies a rule's [`ParamTemplate`] to an event. Extraction only reads
//! fields, so the same event and template always yield the same parameters.

use std::collections::BTreeMap;

use ingest_router_model::{DispatchError, FieldPath, IngestionEvent, ParamTemplate};

/// Derived invocation parameters, ordered by name.
pub type DispatchParams = BTreeMap<String, String>;

/// Apply `template` to `event`.
///
/// Fails with [`DispatchError::MalformedEvent`] when the event lacks a field
/// the template reads.
pub fn extract_params(
    template: &ParamTemplate,
    event: &IngestionEvent,
) -> Result<DispatchParams, DispatchError> {
    template
        .iter()
        .map(|(name, path)| {
            read_field(path, event)
                .map(|value| (name.to_owned(), value))
                .map_err(|reason| {
                    DispatchError::MalformedEvent(format!("parameter `{name}` ({path}): {reason}"))
                })
        })
        .collect()
}

/// Require the fields every backend needs verbatim, plus the event id the
/// idempotent execution name is built from.
pub fn require_location(event: &IngestionEvent) -> Result<(), DispatchError> {
    read_field(&FieldPath::Bucket, event)
        .and_then(|_| read_field(&FieldPath::Key, event))
        .and_then(|_| read_field(&FieldPath::EventId, event))
        .map(|_| ())
        .map_err(DispatchError::MalformedEvent)
}

fn read_field(path: &FieldPath, event: &IngestionEvent) -> Result<String, String> {
    match path {
        FieldPath::Bucket => non_empty(&event.bucket, "bucket"),
        FieldPath::Key => non_empty(&event.key, "key"),
        FieldPath::Size => Ok(event.size.to_string()),
        FieldPath::CreatedAt => Ok(event.created_at.to_rfc3339()),
        FieldPath::EventId => non_empty(&event.event_id, "eventId"),
        FieldPath::Metadata(name) => event
            .metadata
            .get(name)
            .cloned()
            .ok_or_else(|| format!("metadata entry `{name}` is missing")),
    }
}

fn non_empty(value: &str, field: &str) -> Result<String, String> {
    if value.is_empty() {
        Err(format!("event field `{field}` is empty"))
    } else {
        Ok(value.to_owned())
    }
}
