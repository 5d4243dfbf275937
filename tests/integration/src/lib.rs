//! Integration tests for the ingestion router server.
//!
//! These tests require a running server at `localhost:4580` loaded with
//! `tests/integration/rules.json`, with backend endpoints that refuse
//! connections. They are marked `#[ignore]` so they don't run during normal
//! `cargo test`.
//!
//! Run them with:
//! ```text
//! ROUTING_RULES_FILE=tests/integration/rules.json \
//!   FAST_PATH_ENDPOINT=http://127.0.0.1:9 HEAVY_COMPUTE_ENDPOINT=http://127.0.0.1:9 \
//!   RETRY_DELAY_MS=10 cargo run -p ingest-router-server &
//! cargo test -p ingest-router-integration -- --ignored
//! ```

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
#[must_use]
pub fn endpoint_url() -> String {
    std::env::var("INGEST_ROUTER_URL").unwrap_or_else(|_| "http://localhost:4580".to_owned())
}

/// Create an HTTP client for the server.
#[must_use]
pub fn client() -> reqwest::Client {
    init_tracing();
    reqwest::Client::new()
}

/// Generate a unique event id for a test.
#[must_use]
pub fn test_event_id(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// A single-event body for `key` in bucket `lz`, created now.
#[must_use]
pub fn event_body(key: &str, event_id: &str) -> serde_json::Value {
    serde_json::json!({
        "bucket": "lz",
        "key": key,
        "size": 16,
        "createdAt": chrono::Utc::now(),
        "eventId": event_id,
    })
}

/// POST a JSON body to `path` and return the status with the decoded body.
pub async fn post_json(path: &str, body: &serde_json::Value) -> (u16, serde_json::Value) {
    let response = client()
        .post(format!("{}{path}", endpoint_url()))
        .json(body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("failed to POST {path}: {e}"));
    let status = response.status().as_u16();
    let json = response
        .json()
        .await
        .unwrap_or_else(|e| panic!("non-JSON response from {path}: {e}"));
    (status, json)
}

/// GET `path` and return the status with the decoded body.
pub async fn get_json(path: &str) -> (u16, serde_json::Value) {
    let response = client()
        .get(format!("{}{path}", endpoint_url()))
        .send()
        .await
        .unwrap_or_else(|e| panic!("failed to GET {path}: {e}"));
    let status = response.status().as_u16();
    let json = response
        .json()
        .await
        .unwrap_or_else(|e| panic!("non-JSON response from {path}: {e}"));
    (status, json)
}

mod test_dead_letters;
mod test_events;
mod test_health;
mod test_replay;
