//! Operations of the router's HTTP surface.

use std::fmt;

/// All operations the HTTP layer can resolve a request to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestOperation {
    /// Route an S3 notification document or a single event.
    IngestEvents,
    /// Re-feed a dead-letter record's original event through the pipeline.
    Replay,
    /// List the dead-letter records of one event.
    ListDeadLetters,
    /// Liveness check.
    Health,
}

impl IngestOperation {
    /// Returns the operation name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IngestEvents => "IngestEvents",
            Self::Replay => "Replay",
            Self::ListDeadLetters => "ListDeadLetters",
            Self::Health => "Health",
        }
    }
}

impl fmt::Display for IngestOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
