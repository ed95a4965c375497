//! Configuration Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An explicitly named configuration file does not exist
    #[display("configuration file not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The file extension names no supported format
    #[display("unsupported configuration format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// A source could not be parsed or did not fit the schema
    #[display("could not load configuration: {_0}")]
    Load(#[error(not(source))] String),
    /// The merged configuration is out of range
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] &'static str),
    /// No home directory to derive default locations from
    #[display("no platform data directory")]
    NoProjectDirs,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
