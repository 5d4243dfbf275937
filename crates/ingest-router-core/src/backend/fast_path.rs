//! FastPath function invocation over HTTP.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use ingest_router_model::DispatchError;

use super::http::HttpBackendClient;
use super::{FastPathInvoker, InvocationRequest};
use crate::error::RouterResult;
use crate::params::DispatchParams;

/// Invokes `POST {endpoint}/invoke/{target}` and waits for the reply.
#[derive(Debug, Clone)]
pub struct HttpFunctionInvoker {
    client: HttpBackendClient,
}

#[derive(Debug, Serialize)]
struct InvokeBody<'a> {
    bucket: &'a str,
    key: &'a str,
    parameters: &'a DispatchParams,
}

impl HttpFunctionInvoker {
    /// Create an invoker for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> RouterResult<Self> {
        Ok(Self {
            client: HttpBackendClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl FastPathInvoker for HttpFunctionInvoker {
    async fn invoke(&self, request: &InvocationRequest) -> Result<(), DispatchError> {
        let url = self.client.url(&["invoke", &request.target]);
        let body = InvokeBody {
            bucket: &request.bucket,
            key: &request.key,
            parameters: &request.parameters,
        };
        self.client.post_json(&url, &body).await?;
        debug!(target_fn = %request.target, key = %request.key, "function completed");
        Ok(())
    }
}
