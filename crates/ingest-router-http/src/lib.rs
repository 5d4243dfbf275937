//! HTTP service layer for the ingestion router.
//!
//! This crate provides the transport half of the router:
//!
//! - **Router**: maps method and path to an [`IngestOperation`](ingest_router_model::IngestOperation)
//! - **Handler trait**: the boundary between HTTP and the routing pipeline
//! - **Service**: hyper `Service` implementation
//! - **Response helpers**: JSON success/error response formatting

pub mod body;
pub mod dispatch;
pub mod response;
pub mod router;
pub mod service;

pub use body::IngestResponseBody;
pub use dispatch::{HandlerFuture, IngestHandler};
pub use service::{IngestHttpConfig, IngestHttpService};
