//! Shared HTTP plumbing for the backend adapters.

use std::time::Duration;

use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use ingest_router_model::DispatchError;

use crate::error::{RouterError, RouterResult};

/// Characters escaped in a backend target path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Longest response excerpt carried in a failure message.
const MAX_DETAIL_CHARS: usize = 256;

/// JSON-over-HTTP client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackendClient {
    /// Create a client for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> RouterResult<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_owned();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(RouterError::Config(format!(
                "backend endpoint must be an http(s) URL: {endpoint}"
            )));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| RouterError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Absolute URL for `segments`, each percent-encoded.
    #[must_use]
    pub fn url(&self, segments: &[&str]) -> String {
        let mut url = self.endpoint.clone();
        for segment in segments {
            url.push('/');
            url.extend(utf8_percent_encode(segment, SEGMENT));
        }
        url
    }

    /// POST `body` as JSON and return the response body of a 2xx reply.
    pub async fn post_json<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<Bytes, DispatchError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;
        let status = response.status();
        let payload = response.bytes().await.map_err(|e| classify_transport(&e))?;
        debug!(%url, status = status.as_u16(), body_len = payload.len(), "backend replied");
        if status.is_success() {
            Ok(payload)
        } else {
            Err(classify_status(status, &payload))
        }
    }
}

/// Map a non-2xx reply to the failure taxonomy.
///
/// 408, 429 and 5xx are transient; any other status is a permanent rejection.
#[must_use]
pub fn classify_status(status: StatusCode, body: &[u8]) -> DispatchError {
    let detail = format!("{status}: {}", excerpt(body));
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            DispatchError::Throttled(detail)
        }
        StatusCode::REQUEST_TIMEOUT => DispatchError::BackendFailed(detail),
        s if s.is_server_error() => DispatchError::BackendFailed(detail),
        _ => DispatchError::Rejected(detail),
    }
}

/// Map a transport error to the failure taxonomy. All are transient.
#[must_use]
pub fn classify_transport(err: &reqwest::Error) -> DispatchError {
    if err.is_connect() || err.is_timeout() {
        DispatchError::Unreachable(err.to_string())
    } else {
        DispatchError::BackendFailed(err.to_string())
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() > MAX_DETAIL_CHARS {
        let cut: String = text.chars().take(MAX_DETAIL_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_owned()
    }
}
