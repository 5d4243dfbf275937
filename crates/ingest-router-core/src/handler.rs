//! Handler bridging the HTTP layer to the router.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ingest_router_http::body::IngestResponseBody;
use ingest_router_http::dispatch::{HandlerFuture, IngestHandler};
use ingest_router_http::response::json_response;
use ingest_router_model::{
    DeadLetterRecord, EventReport, IngestError, IngestOperation, IngestionEvent,
    S3EventNotification,
};

use crate::dead_letter::DeadLetterSink;
use crate::router::IngestRouter;

/// Handler that feeds HTTP request bodies to an [`IngestRouter`].
#[derive(Debug, Clone)]
pub struct RouterHandler {
    router: IngestRouter,
}

impl RouterHandler {
    /// Create a new handler wrapping a router.
    #[must_use]
    pub fn new(router: IngestRouter) -> Self {
        Self { router }
    }
}

impl IngestHandler for RouterHandler {
    fn handle_operation(&self, op: IngestOperation, body: Bytes) -> HandlerFuture {
        let router = self.router.clone();
        Box::pin(async move { dispatch(&router, op, &body).await })
    }
}

#[derive(Debug, Serialize)]
struct RoutedEvents {
    events: Vec<EventReport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeadLetterQuery {
    event_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeadLetters {
    dead_letters: Vec<DeadLetterRecord>,
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
}

async fn dispatch(
    router: &IngestRouter,
    op: IngestOperation,
    body: &[u8],
) -> Result<http::Response<IngestResponseBody>, IngestError> {
    match op {
        IngestOperation::Health => serialize(&HealthStatus { status: "running" }),
        IngestOperation::IngestEvents => {
            let events = decode_events(body, router)?;
            debug!(events = events.len(), "routing submitted events");
            let events = router.route_all(events).await;
            serialize(&RoutedEvents { events })
        }
        IngestOperation::Replay => {
            let record: DeadLetterRecord = deserialize(body)?;
            record.original_event.validate()?;
            let report = router.replay(record).await;
            serialize(&RoutedEvents {
                events: vec![report],
            })
        }
        IngestOperation::ListDeadLetters => {
            let query: DeadLetterQuery = deserialize(body)?;
            if query.event_id.is_empty() {
                return Err(IngestError::validation("eventId must not be empty"));
            }
            let dead_letters = router
                .dead_letters()
                .for_event(&query.event_id)
                .await
                .map_err(|e| IngestError::internal_error(format!("failed to read dead letters: {e}")))?;
            serialize(&DeadLetters { dead_letters })
        }
    }
}

/// Decode either an S3 notification document or a single event.
fn decode_events(body: &[u8], router: &IngestRouter) -> Result<Vec<IngestionEvent>, IngestError> {
    let value: serde_json::Value = deserialize(body)?;
    if value.get("Records").is_some() {
        let notification: S3EventNotification = from_value(value)?;
        notification.into_events(router.now())
    } else {
        let event: IngestionEvent = from_value(value)?;
        event.validate()?;
        Ok(vec![event])
    }
}

/// Deserialize a JSON request body.
fn deserialize<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, IngestError> {
    serde_json::from_slice(body)
        .map_err(|e| IngestError::serialization(format!("failed to deserialize request body: {e}")))
}

fn from_value<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, IngestError> {
    serde_json::from_value(value)
        .map_err(|e| IngestError::serialization(format!("failed to decode event: {e}")))
}

/// Serialize an output type into a JSON HTTP response.
fn serialize<T: Serialize>(output: &T) -> Result<http::Response<IngestResponseBody>, IngestError> {
    let json = serde_json::to_vec(output)
        .map_err(|e| IngestError::internal_error(format!("failed to serialize response: {e}")))?;
    Ok(json_response(json))
}
