//! Generator Error Types
//!
//! Errors raised while processing one node. They never cross node
//! boundaries: the node's sink receives them through `on_error`.

use derive_more::{Display, Error};

/// A generator error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for generator operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Neither an archive nor an image this build can decode
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The resource's bytes could not be obtained
    #[display("could not fetch resource: {_0}")]
    Fetch(#[error(not(source))] String),
    /// An archive could not be listed
    #[display("unreadable archive: {_0}")]
    Archive(#[error(not(source))] String),
    #[display("could not decode image: {_0}")]
    Decode(#[error(not(source))] String),
    #[display("could not encode tile")]
    Encode,
    /// The tile writer rejected a file entry or tile
    #[display("could not persist: {_0}")]
    Persistence(#[error(not(source))] String),
    #[display("cancelled")]
    Cancelled,
    /// Processing the node panicked, usually inside a decoder
    #[display("processing panicked: {_0}")]
    Panicked(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    #[track_caller]
    pub fn fetch(err: mosaic_blob::Error) -> Error {
        let detail = (*err).to_string();
        err.raise(Self::Fetch(detail))
    }

    /// A missing 7z executable means this build cannot handle the format at
    /// all, which is not the same as a broken archive.
    #[track_caller]
    pub fn archive(err: mosaic_archive::Error) -> Error {
        use mosaic_archive::ErrorKind as ArchiveErrorKind;
        let detail = (*err).to_string();
        if matches!(*err, ArchiveErrorKind::UnsupportedFormat(_) | ArchiveErrorKind::ToolNotFound) {
            err.raise(Self::UnsupportedFormat(detail))
        } else {
            err.raise(Self::Archive(detail))
        }
    }

    #[track_caller]
    pub fn persistence(err: mosaic_cache::Error) -> Error {
        let detail = (*err).to_string();
        err.raise(Self::Persistence(detail))
    }
}
