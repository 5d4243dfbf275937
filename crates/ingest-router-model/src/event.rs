//! Inbound object-creation events.
//!
//! The router consumes [`IngestionEvent`]s. They are usually decoded from the
//! S3 event-notification document ([`S3EventNotification`]), whose object
//! keys arrive form-encoded (`+` for spaces, `%XX` escapes).

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Metadata key holding the source event name (e.g. `ObjectCreated:Put`).
pub const META_EVENT_NAME: &str = "eventName";
/// Metadata key holding the object's ETag.
pub const META_ETAG: &str = "eTag";
/// Metadata key holding the bucket notification configuration id.
pub const META_CONFIGURATION_ID: &str = "configurationId";

/// A single object-creation notification.
///
/// Immutable once received: the router shares it behind an `Arc` and only
/// ever reads it. Dead-letter records carry a verbatim copy so a replay runs
/// the full pipeline on exactly what the source sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionEvent {
    /// Bucket the object was written to.
    pub bucket: String,
    /// Decoded object key.
    pub key: String,
    /// Object size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Time the object was created at the source.
    pub created_at: DateTime<Utc>,
    /// Source-assigned unique identifier.
    pub event_id: String,
    /// Extra string attributes carried from the source.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl IngestionEvent {
    /// Create an event with no metadata.
    #[must_use]
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        size: u64,
        created_at: DateTime<Utc>,
        event_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size,
            created_at,
            event_id: event_id.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    /// Reject an event without an id.
    ///
    /// Dead letters are keyed by (event id, rule id), so two id-less events
    /// would collapse into one record. An empty bucket or key is left to the
    /// dispatcher, which dead-letters it as malformed.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.event_id.is_empty() {
            return Err(IngestError::validation("event is missing the eventId"));
        }
        Ok(())
    }
}

/// S3 event-notification document (`{"Records": [...]}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3EventNotification {
    /// Notification records, one per object event.
    #[serde(default)]
    pub records: Vec<S3EventRecord>,
}

/// One record of an [`S3EventNotification`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3EventRecord {
    /// Event name, e.g. `ObjectCreated:Put`.
    #[serde(default)]
    pub event_name: Option<String>,
    /// Time the event occurred.
    #[serde(default)]
    pub event_time: Option<DateTime<Utc>>,
    /// Response elements (`x-amz-request-id`, `x-amz-id-2`).
    #[serde(default)]
    pub response_elements: Option<HashMap<String, String>>,
    /// The S3 entity.
    #[serde(default)]
    pub s3: Option<S3Entity>,
}

/// Bucket and object portion of a notification record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Entity {
    /// Notification configuration id that fired.
    #[serde(default)]
    pub configuration_id: Option<String>,
    /// Bucket description.
    #[serde(default)]
    pub bucket: Option<S3BucketEntity>,
    /// Object description.
    #[serde(default)]
    pub object: Option<S3ObjectEntity>,
}

/// Bucket description within a notification record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3BucketEntity {
    /// Bucket name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Object description within a notification record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3ObjectEntity {
    /// Form-encoded object key.
    #[serde(default)]
    pub key: Option<String>,
    /// Object size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Object ETag.
    #[serde(default)]
    pub e_tag: Option<String>,
    /// Ordering token unique per key and event.
    #[serde(default)]
    pub sequencer: Option<String>,
}

impl S3EventNotification {
    /// Decode every record into an [`IngestionEvent`].
    ///
    /// `received_at` stands in for a missing `eventTime`.
    pub fn into_events(self, received_at: DateTime<Utc>) -> Result<Vec<IngestionEvent>, IngestError> {
        self.records
            .into_iter()
            .enumerate()
            .map(|(index, record)| record.into_event(received_at).map_err(|e| e.at_record(index)))
            .collect()
    }
}

impl S3EventRecord {
    /// Decode this record into an [`IngestionEvent`].
    ///
    /// A record without a bucket name or object key is rejected; the router
    /// cannot match or replay it.
    pub fn into_event(self, received_at: DateTime<Utc>) -> Result<IngestionEvent, IngestError> {
        let entity = self
            .s3
            .ok_or_else(|| IngestError::validation("record has no s3 entity"))?;
        let bucket = entity
            .bucket
            .and_then(|b| b.name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| IngestError::validation("record is missing the bucket name"))?;
        let object = entity
            .object
            .ok_or_else(|| IngestError::validation("record is missing the object"))?;
        let raw_key = object
            .key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| IngestError::validation("record is missing the object key"))?;

        let request_id = self
            .response_elements
            .as_ref()
            .and_then(|r| r.get("x-amz-request-id"))
            .filter(|req| !req.is_empty())
            .cloned();
        let sequencer = object.sequencer.as_deref().filter(|seq| !seq.is_empty());
        let event_id = match (request_id, sequencer) {
            (Some(req), Some(seq)) => format!("{req}:{seq}"),
            (Some(req), None) => req,
            (None, Some(seq)) => format!("{bucket}:{seq}"),
            (None, None) => uuid::Uuid::new_v4().to_string(),
        };

        let mut event = IngestionEvent::new(
            bucket,
            decode_object_key(&raw_key),
            object.size.unwrap_or_default(),
            self.event_time.unwrap_or(received_at),
            event_id,
        );
        if let Some(name) = self.event_name {
            event.metadata.insert(META_EVENT_NAME.to_owned(), name);
        }
        if let Some(etag) = object.e_tag {
            event.metadata.insert(META_ETAG.to_owned(), etag);
        }
        if let Some(config_id) = entity.configuration_id {
            event
                .metadata
                .insert(META_CONFIGURATION_ID.to_owned(), config_id);
        }
        Ok(event)
    }
}

/// Decode a form-encoded S3 notification key.
///
/// `+` becomes a space before percent-decoding, so a literal plus (sent as
/// `%2B`) survives.
#[must_use]
pub fn decode_object_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
