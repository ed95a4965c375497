use super::Fetcher;
use crate::error::{ErrorKind, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// In-memory [`Fetcher`] for tests.
///
/// Unknown URLs answer `404`. Failures queued with
/// [`fail_next`](Self::fail_next) are returned, in order, before the
/// configured response.
#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, VecDeque<ErrorKind>>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_response(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.responses.lock().insert(url.into(), body.into());
        self
    }

    pub fn fail_next(&self, url: impl Into<String>, kind: ErrorKind) {
        self.failures.lock().entry(url.into()).or_default().push_back(kind);
    }

    /// URLs requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.lock().push(url.to_string());
        if let Some(kind) = self.failures.lock().get_mut(url).and_then(VecDeque::pop_front) {
            exn::bail!(kind);
        }
        match self.responses.lock().get(url) {
            Some(body) => Ok(body.clone()),
            None => exn::bail!(ErrorKind::Status(404)),
        }
    }
}
