//! Error types for the router core.

use ingest_router_model::BackendKind;

/// Errors raised while loading configuration, building the router, or
/// writing to the dead-letter store.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// A file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The rules document is not valid JSON for the expected shape.
    #[error("invalid rules document {path}: {source}")]
    InvalidRules {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Two rules share an id.
    #[error("duplicate rule id: {0}")]
    DuplicateRule(String),

    /// A rule is structurally unusable.
    #[error("invalid rule {rule}: {reason}")]
    InvalidRule {
        /// Rule id (may be empty).
        rule: String,
        /// What is wrong.
        reason: String,
    },

    /// Two same-kind rules can match the same key while exclusive delivery is required.
    #[error("rules {first} and {second} overlap on backend {kind}")]
    OverlappingRules {
        /// Earlier rule.
        first: String,
        /// Later rule.
        second: String,
        /// Shared backend kind.
        kind: BackendKind,
    },

    /// A rule targets a backend kind with no configured adapter.
    #[error("rule {rule} targets {kind} but no {kind} backend is configured")]
    BackendMissing {
        /// Rule id.
        rule: String,
        /// Backend kind.
        kind: BackendKind,
    },

    /// A retry policy is unusable.
    #[error("invalid retry policy for {scope}: {reason}")]
    InvalidPolicy {
        /// Backend kind or `default`.
        scope: String,
        /// What is wrong.
        reason: String,
    },

    /// The dead-letter store failed.
    #[error("dead-letter store error: {0}")]
    DeadLetter(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
