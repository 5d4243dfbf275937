//! Router error types.
//!
//! [`DispatchError`] is the failure taxonomy of a single backend invocation;
//! [`IngestError`] is the error returned across the HTTP boundary.

use std::fmt;
use std::time::Duration;

use crate::rule::BackendKind;

/// Failure of a single dispatch attempt.
///
/// Permanent variants go straight to dead-letter; transient variants are
/// retried within the chain's retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The event lacks a field the rule's parameter template reads.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The backend refused the request shape.
    #[error("backend rejected request: {0}")]
    Rejected(String),

    /// No adapter is configured for the rule's backend kind.
    #[error("no backend configured for {0}")]
    NotConfigured(BackendKind),

    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend signalled throttling or queue saturation.
    #[error("backend throttled: {0}")]
    Throttled(String),

    /// The backend did not acknowledge within the router's wait bound.
    #[error("no acknowledgment from backend within {0:?}")]
    Timeout(Duration),

    /// The backend reported a failure it may recover from.
    #[error("backend failed: {0}")]
    BackendFailed(String),
}

impl DispatchError {
    /// Whether retrying can never fix this failure.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::MalformedEvent(_) | Self::Rejected(_) | Self::NotConfigured(_)
        )
    }

    /// Whether this failure is eligible for retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !self.is_permanent()
    }
}

/// Well-known error codes of the router's HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum IngestErrorCode {
    /// Request body is not valid JSON for the operation.
    SerializationException,
    /// Request body decoded but is semantically invalid.
    #[default]
    ValidationException,
    /// No such route.
    NotFound,
    /// Route exists but not for this method.
    MethodNotAllowed,
    /// Unexpected server-side failure.
    InternalServerError,
}

impl IngestErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SerializationException => "SerializationException",
            Self::ValidationException => "ValidationException",
            Self::NotFound => "NotFound",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::InternalServerError => "InternalServerError",
        }
    }

    /// Returns the default HTTP status code for this error.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::SerializationException | Self::ValidationException => {
                http::StatusCode::BAD_REQUEST
            }
            Self::NotFound => http::StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::InternalServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for IngestErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error response of the router's HTTP surface.
#[derive(Debug)]
pub struct IngestError {
    /// The error code.
    pub code: IngestErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The HTTP status code.
    pub status_code: http::StatusCode,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IngestError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for IngestError {}

impl IngestError {
    /// Create a new `IngestError` with a custom message.
    #[must_use]
    pub fn with_message(code: IngestErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
        }
    }

    /// Prefix the message with the index of the offending notification record.
    #[must_use]
    pub fn at_record(mut self, index: usize) -> Self {
        self.message = format!("record {index}: {}", self.message);
        self
    }

    // -- Convenience constructors --

    /// Invalid JSON body.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::with_message(IngestErrorCode::SerializationException, message)
    }

    /// Semantically invalid body.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(IngestErrorCode::ValidationException, message)
    }

    /// Unknown path.
    #[must_use]
    pub fn not_found(path: &str) -> Self {
        Self::with_message(IngestErrorCode::NotFound, format!("no route for {path}"))
    }

    /// Known path, wrong method.
    #[must_use]
    pub fn method_not_allowed(method: &http::Method, path: &str) -> Self {
        Self::with_message(
            IngestErrorCode::MethodNotAllowed,
            format!("{method} is not allowed on {path}"),
        )
    }

    /// Internal failure.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(IngestErrorCode::InternalServerError, message)
    }
}
