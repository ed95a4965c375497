//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No registered loader recognises the data by magic bytes or extension.
    #[display("unsupported archive format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The archive does not contain the requested member.
    #[display("member not found in archive: {_0}")]
    MemberNotFound(#[error(not(source))] String),
    /// The archive could be identified but not read. Don't retry with the same input.
    #[display("invalid or corrupted archive")]
    Corrupt,
    /// Member name escapes the archive root or is otherwise unusable as a path.
    #[display("invalid member path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// The loader needs a directory on disk but was given something else.
    #[display("not a directory")]
    NotADirectory,
    /// No external 7-Zip executable was found on `PATH`.
    #[display("7z executable not found")]
    ToolNotFound,
    /// The external 7-Zip executable exited unsuccessfully.
    #[display("7z exited with code: {_0}")]
    ToolFailed(#[error(not(source))] i32),
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}
