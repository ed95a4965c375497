//! Locator Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A locator error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for locator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nothing to parse.
    #[display("empty locator")]
    Empty,
    /// The first segment is not of the form `scheme://path`.
    #[display("missing scheme in locator: {_0}")]
    MissingScheme(#[error(not(source))] String),
    /// The scheme is not one we know how to fetch.
    #[display("unsupported scheme: {_0}")]
    UnsupportedScheme(#[error(not(source))] String),
    /// A `!` separator with nothing on one side of it.
    #[display("empty segment in locator: {_0}")]
    EmptySegment(#[error(not(source))] String),
    /// A trailing backslash that escapes nothing.
    #[display("dangling escape in locator: {_0}")]
    DanglingEscape(#[error(not(source))] String),
    /// Filesystem path could not be turned into a locator.
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
