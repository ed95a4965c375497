//! Blob Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A blob error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for blob operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local file does not exist
    #[display("file not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Access denied
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// A directory was given where file content is needed
    #[display("is a directory: {_0}")]
    IsDirectory(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error")]
    Io,
    /// Transport-level failure talking to a remote host
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Remote host answered with a non-success status
    #[display("unexpected HTTP status: {_0}")]
    Status(#[error(not(source))] u16),
    /// No collaborator is configured for this locator's scheme
    #[display("no fetcher for scheme: {_0}")]
    UnsupportedScheme(#[error(not(source))] String),
    /// Reading a member out of its parent archive failed
    #[display("could not read archive member")]
    Archive,
    /// Transient failures persisted through every attempt
    #[display("gave up after {_0} attempts")]
    RetriesExhausted(#[error(not(source))] u32),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io | Self::Network(_) => true,
            Self::Status(code) => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}
