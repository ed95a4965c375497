use super::Fetcher;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_USER_AGENT: &str = concat!("mosaic/", env!("CARGO_PKG_VERSION"));

/// [`Fetcher`] backed by a blocking `reqwest` client.
///
/// The client is built on first use. Building a blocking client spins up its
/// own runtime, which panics when done from inside an async context, so
/// construction is deferred to the worker thread that first needs it.
pub struct HttpFetcher {
    timeout: Duration,
    user_agent: String,
    client: OnceLock<reqwest::blocking::Client>,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), DEFAULT_USER_AGENT)
    }
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self { timeout, user_agent: user_agent.into(), client: OnceLock::new() }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .or_raise(|| ErrorKind::Network("could not build HTTP client".to_string()))?;
        // Another worker may have won the race; either client is fine.
        Ok(self.client.get_or_init(|| client))
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self), fields(status, bytes))]
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client()?
            .get(url)
            .send()
            .or_raise(|| ErrorKind::Network(format!("request to {url} failed")))?;
        let status = response.status();
        tracing::Span::current().record("status", status.as_u16());
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        let body = response
            .bytes()
            .or_raise(|| ErrorKind::Network(format!("could not read response from {url}")))?;
        tracing::Span::current().record("bytes", body.len());
        Ok(body.to_vec())
    }
}
