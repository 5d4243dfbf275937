//! Workflow engine adapter over HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ingest_router_model::DispatchError;

use super::http::HttpBackendClient;
use super::{InvocationRequest, WorkflowStarter};
use crate::error::RouterResult;
use crate::params::DispatchParams;

/// Starts executions with `POST {endpoint}/workflows/{target}/executions`.
///
/// The execution is named after the (event, rule) pair, so an engine that
/// enforces unique names deduplicates repeated starts.
#[derive(Debug, Clone)]
pub struct HttpWorkflowStarter {
    client: HttpBackendClient,
}

#[derive(Debug, Serialize)]
struct StartExecutionBody<'a> {
    name: &'a str,
    input: &'a DispatchParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionAck {
    execution_id: String,
}

impl HttpWorkflowStarter {
    /// Create a starter for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> RouterResult<Self> {
        Ok(Self {
            client: HttpBackendClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl WorkflowStarter for HttpWorkflowStarter {
    async fn start(&self, request: &InvocationRequest) -> Result<String, DispatchError> {
        let url = self.client.url(&["workflows", &request.target, "executions"]);
        let body = StartExecutionBody {
            name: &request.idempotency_key,
            input: &request.parameters,
        };
        let payload = self.client.post_json(&url, &body).await?;
        let execution_id = match serde_json::from_slice::<StartExecutionAck>(&payload) {
            Ok(ack) => ack.execution_id,
            Err(e) => {
                warn!(
                    workflow = %request.target,
                    error = %e,
                    "workflow accepted but acknowledgment is unreadable, using execution name as handle",
                );
                request.idempotency_key.clone()
            }
        };
        debug!(workflow = %request.target, %execution_id, "workflow started");
        Ok(execution_id)
    }
}
