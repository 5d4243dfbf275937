//! Job queue adapter over HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ingest_router_model::DispatchError;

use super::http::HttpBackendClient;
use super::{InvocationRequest, JobSubmitter};
use crate::error::RouterResult;
use crate::params::DispatchParams;

/// Submits jobs with `POST {endpoint}/queues/{target}/jobs`.
///
/// The job receives `[bucket, key]` as positional parameters and the
/// template's output as named parameters.
#[derive(Debug, Clone)]
pub struct HttpJobSubmitter {
    client: HttpBackendClient,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitJobBody<'a> {
    job_name: &'a str,
    parameters: [&'a str; 2],
    named_parameters: &'a DispatchParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitJobAck {
    job_id: String,
}

impl HttpJobSubmitter {
    /// Create a submitter for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> RouterResult<Self> {
        Ok(Self {
            client: HttpBackendClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl JobSubmitter for HttpJobSubmitter {
    async fn submit(&self, request: &InvocationRequest) -> Result<String, DispatchError> {
        let url = self.client.url(&["queues", &request.target, "jobs"]);
        let body = SubmitJobBody {
            job_name: &request.idempotency_key,
            parameters: [request.bucket.as_str(), request.key.as_str()],
            named_parameters: &request.parameters,
        };
        let payload = self.client.post_json(&url, &body).await?;
        let job_id = match serde_json::from_slice::<SubmitJobAck>(&payload) {
            Ok(ack) => ack.job_id,
            Err(e) => {
                warn!(
                    queue = %request.target,
                    error = %e,
                    "job accepted but acknowledgment is unreadable, using job name as handle",
                );
                request.idempotency_key.clone()
            }
        };
        debug!(queue = %request.target, %job_id, "job submitted");
        Ok(job_id)
    }
}
