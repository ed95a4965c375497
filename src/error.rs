//! Command Error Types

use derive_more::{Display, Error};

/// A command error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("could not start the async runtime")]
    Runtime,
    #[display("tile database error")]
    Database,
    #[display("could not start workers")]
    Jobs,
    /// A command-line source is neither a locator nor a usable path
    #[display("invalid source: {_0}")]
    InvalidSource(#[error(not(source))] String),
}
