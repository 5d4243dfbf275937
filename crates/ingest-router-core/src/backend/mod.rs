//! Backend adapters.
//!
//! Each backend kind has its own invocation capability:
//!
//! - [`FastPathInvoker`]: synchronous call, completion is success.
//! - [`WorkflowStarter`]: start a workflow execution, return its id at once.
//! - [`JobSubmitter`]: submit a job, return its id at once.
//!
//! [`Backend`] tags one adapter with its kind and exposes a single
//! [`Backend::call`] that yields a [`DispatchHandle`]. Work accepted by an
//! asynchronous backend completes out of band and is never awaited here.

mod fast_path;
pub mod http;
mod job;
mod workflow;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use ingest_router_model::{BackendKind, DispatchError, DispatchHandle};

pub use self::fast_path::HttpFunctionInvoker;
pub use self::job::HttpJobSubmitter;
pub use self::workflow::HttpWorkflowStarter;
use crate::config::RouterConfig;
use crate::error::RouterResult;
use crate::params::DispatchParams;

/// Longest idempotent execution or job name.
pub const MAX_EXECUTION_NAME_LEN: usize = 80;

/// Everything an adapter needs to address one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    /// Backend resource from the rule.
    pub target: String,
    /// Source bucket, verbatim.
    pub bucket: String,
    /// Source key, verbatim.
    pub key: String,
    /// Parameters derived from the rule's template.
    pub parameters: DispatchParams,
    /// Stable name for this (event, rule) pair.
    pub idempotency_key: String,
}

/// Synchronous function invocation.
#[async_trait]
pub trait FastPathInvoker: Send + Sync + fmt::Debug {
    /// Run the function to completion.
    async fn invoke(&self, request: &InvocationRequest) -> Result<(), DispatchError>;
}

/// Workflow engine.
#[async_trait]
pub trait WorkflowStarter: Send + Sync + fmt::Debug {
    /// Start an execution and return its id.
    async fn start(&self, request: &InvocationRequest) -> Result<String, DispatchError>;
}

/// Job execution queue.
#[async_trait]
pub trait JobSubmitter: Send + Sync + fmt::Debug {
    /// Submit a job and return its id.
    async fn submit(&self, request: &InvocationRequest) -> Result<String, DispatchError>;
}

/// A backend adapter tagged with its kind.
#[derive(Debug, Clone)]
pub enum Backend {
    /// FastPath function.
    FastPath(Arc<dyn FastPathInvoker>),
    /// BatchOrchestration workflow engine.
    BatchOrchestration(Arc<dyn WorkflowStarter>),
    /// HeavyCompute job queue.
    HeavyCompute(Arc<dyn JobSubmitter>),
}

impl Backend {
    /// Kind of this backend.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::FastPath(_) => BackendKind::FastPath,
            Self::BatchOrchestration(_) => BackendKind::BatchOrchestration,
            Self::HeavyCompute(_) => BackendKind::HeavyCompute,
        }
    }

    /// Invoke the backend.
    pub async fn call(&self, request: &InvocationRequest) -> Result<DispatchHandle, DispatchError> {
        match self {
            Self::FastPath(invoker) => invoker.invoke(request).await.map(|()| DispatchHandle::Completed),
            Self::BatchOrchestration(starter) => starter
                .start(request)
                .await
                .map(|execution_id| DispatchHandle::Workflow { execution_id }),
            Self::HeavyCompute(submitter) => submitter
                .submit(request)
                .await
                .map(|job_id| DispatchHandle::Job { job_id }),
        }
    }
}

/// Configured backends, at most one per kind.
#[derive(Debug, Clone, Default)]
pub struct Backends {
    by_kind: HashMap<BackendKind, Backend>,
}

impl Backends {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `backend`, replacing any backend of the same kind.
    #[must_use]
    pub fn with(mut self, backend: Backend) -> Self {
        self.by_kind.insert(backend.kind(), backend);
        self
    }

    /// Backend for `kind`.
    #[must_use]
    pub fn get(&self, kind: BackendKind) -> Option<&Backend> {
        self.by_kind.get(&kind)
    }

    /// Whether a backend of `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: BackendKind) -> bool {
        self.by_kind.contains_key(&kind)
    }

    /// HTTP adapters for every endpoint set in `config`.
    pub fn from_config(config: &RouterConfig) -> RouterResult<Self> {
        let mut backends = Self::new();
        if let Some(endpoint) = config.endpoint(BackendKind::FastPath) {
            backends = backends.with(Backend::FastPath(Arc::new(HttpFunctionInvoker::new(endpoint)?)));
        }
        if let Some(endpoint) = config.endpoint(BackendKind::BatchOrchestration) {
            backends = backends.with(Backend::BatchOrchestration(Arc::new(
                HttpWorkflowStarter::new(endpoint)?,
            )));
        }
        if let Some(endpoint) = config.endpoint(BackendKind::HeavyCompute) {
            backends = backends.with(Backend::HeavyCompute(Arc::new(HttpJobSubmitter::new(endpoint)?)));
        }
        Ok(backends)
    }
}

/// Longest rule id kept verbatim in an execution name.
const MAX_RULE_PART_LEN: usize = 40;

/// Hex digits of the pair digest appended to every execution name.
const DIGEST_LEN: usize = 16;

/// Idempotent execution name for an (event, rule) pair.
///
/// Shaped `{event}-{rule}-{digest}` where the digest is a SHA-256 prefix of
/// `{event_id}/{rule_id}`. Only the event part is shortened to fit
/// [`MAX_EXECUTION_NAME_LEN`], so two rules never share a name for the same
/// event. Characters outside `[A-Za-z0-9_-]` become `-`.
#[must_use]
pub fn execution_name(event_id: &str, rule_id: &str) -> String {
    let digest = hex::encode(Sha256::digest(format!("{event_id}/{rule_id}").as_bytes()));
    let rule = sanitize(rule_id, MAX_RULE_PART_LEN);
    let budget = MAX_EXECUTION_NAME_LEN - DIGEST_LEN - rule.len() - 2;
    let event = sanitize(event_id, budget);
    format!("{event}-{rule}-{}", &digest[..DIGEST_LEN])
}

fn sanitize(raw: &str, limit: usize) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .take(limit)
        .collect()
}
