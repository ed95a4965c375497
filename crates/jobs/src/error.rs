//! Job Error Types

use derive_more::{Display, Error};

/// A job system error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for job system operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A pool needs at least one worker
    #[display("worker count must be at least 1")]
    NoWorkers,
    /// The OS refused to start a worker thread
    #[display("could not spawn worker thread")]
    Spawn,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Spawn)
    }
}
