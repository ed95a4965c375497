//! Content-addressed access to the bytes behind resource locators.
//!
//! [`BlobManager`] turns a [`ResourceLocator`](mosaic_locator::ResourceLocator)
//! into a [`Blob`]: local files are read, `http(s)` sources are fetched with
//! bounded retries, and nested members are read out of their parent archive.

mod blob;
mod digest;
pub mod error;
pub mod fetch;
mod manager;
mod retry;
mod store;

pub use crate::blob::{Blob, BlobInfo};
pub use crate::digest::Digest;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::fetch::{Fetcher, FetcherHandle, HttpFetcher, MockFetcher};
pub use crate::manager::{BlobManager, DEFAULT_CACHE_BYTES, Resource};
pub use crate::retry::Backoff;
