//! Router handler trait and operation dispatch.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use ingest_router_model::{IngestError, IngestOperation};

use crate::body::IngestResponseBody;

/// Boxed future returned by [`IngestHandler::handle_operation`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<IngestResponseBody>, IngestError>> + Send>>;

/// Trait that the routing pipeline must implement.
///
/// The handler receives a resolved operation and the raw JSON body bytes,
/// and returns a complete HTTP response. This trait is the boundary between
/// the HTTP transport layer and the routing logic.
pub trait IngestHandler: Send + Sync + 'static {
    /// Handle an operation and produce an HTTP response.
    fn handle_operation(&self, op: IngestOperation, body: Bytes) -> HandlerFuture;
}

/// Dispatch an operation to the handler.
pub async fn dispatch_operation<H: IngestHandler>(
    handler: &H,
    op: IngestOperation,
    body: Bytes,
) -> Result<http::Response<IngestResponseBody>, IngestError> {
    tracing::debug!(operation = %op, body_len = body.len(), "dispatching router operation");
    handler.handle_operation(op, body).await
}
