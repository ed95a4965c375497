use crate::error::{ErrorKind, Result};
use std::time::Duration;

/// Bounded exponential backoff for transient fetch failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    /// Attempts after the first one.
    pub retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { retries: 3, base: Duration::from_millis(250), max: Duration::from_secs(5) }
    }
}

impl Backoff {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self { retries: 0, base: Duration::ZERO, max: Duration::ZERO }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Run `op`, retrying while it fails with a retryable error. When every
    /// attempt failed the last error is wrapped in
    /// [`RetriesExhausted`](ErrorKind::RetriesExhausted); non-retryable
    /// errors pass through untouched on the first occurrence.
    pub fn retry<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.retries {
                return Err(err.raise(ErrorKind::RetriesExhausted(attempt + 1)));
            }
            attempt += 1;
            let delay = self.delay(attempt);
            let kind: &ErrorKind = &err;
            tracing::debug!(attempt, ?delay, error = %kind, "retrying after transient failure");
            std::thread::sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn quick(retries: u32) -> Backoff {
        Backoff { retries, base: Duration::from_millis(1), max: Duration::from_millis(2) }
    }

    #[rstest]
    #[case(1, Duration::from_millis(250))]
    #[case(2, Duration::from_millis(500))]
    #[case(3, Duration::from_millis(1000))]
    #[case(10, Duration::from_secs(5))]
    #[case(40, Duration::from_secs(5))]
    fn test_delay(#[case] attempt: u32, #[case] expected: Duration) {
        assert_eq!(Backoff::default().delay(attempt), expected);
    }

    #[test]
    fn test_retry_until_success() {
        let mut calls = 0;
        let value = quick(3)
            .retry(|| {
                calls += 1;
                if calls < 3 { exn::bail!(ErrorKind::Status(503)) } else { Ok(calls) }
            })
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_retry_exhausted() {
        let mut calls = 0;
        let err = quick(2)
            .retry::<()>(|| {
                calls += 1;
                exn::bail!(ErrorKind::Network("reset".to_string()))
            })
            .unwrap_err();
        assert_eq!(calls, 3);
        assert_eq!(*err, ErrorKind::RetriesExhausted(3));
    }

    #[test]
    fn test_permanent_error_not_retried() {
        let mut calls = 0;
        let err = quick(5)
            .retry::<()>(|| {
                calls += 1;
                exn::bail!(ErrorKind::Status(404))
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(*err, ErrorKind::Status(404));
    }
}
