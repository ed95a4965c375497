//! Remote byte sources.
//!
//! The blob manager never talks to the network directly; it goes through a
//! [`Fetcher`] so tests can substitute [`MockFetcher`].

mod http;
mod mock;

pub use http::{DEFAULT_USER_AGENT, HttpFetcher};
pub use mock::MockFetcher;

use crate::error::Result;
use std::sync::Arc;

/// Synchronous byte download. Implementations are called from job worker
/// threads and may block.
pub trait Fetcher: Send + Sync {
    /// Download the full body at `url`.
    ///
    /// Transient failures must surface as retryable
    /// [`ErrorKind`](crate::ErrorKind)s so the caller's backoff applies.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub type FetcherHandle = Arc<dyn Fetcher>;
