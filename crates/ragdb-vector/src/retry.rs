//! Bounded retry for transient storage faults.

use std::time::Duration;
use tracing::warn;

use ragdb_core::config::RetrySettings;
use ragdb_core::error::StoreError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
    markers: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self { Self::from_settings(&RetrySettings::default()) }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, markers: Vec<String>) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay, markers }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(settings.max_attempts, settings.base_delay(), settings.transient_markers.clone())
    }

    pub fn max_attempts(&self) -> usize { self.max_attempts }
    pub fn markers(&self) -> &[String] { &self.markers }

    /// Pause after the given 1-based failed attempt.
    pub fn delay_after(&self, attempt: usize) -> Duration {
        self.base_delay.saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
    }

    /// Adapters that could not classify an error report it as `Backend`; a
    /// message carrying one of our markers is still retried.
    fn is_retryable(&self, err: &StoreError) -> bool {
        match err {
            StoreError::Transient(_) => true,
            StoreError::Backend(msg) => StoreError::classify(msg.as_str(), &self.markers).is_transient(),
        }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. On exhaustion the last error is returned as
    /// `Transient`, whatever variant the adapter reported it as.
    pub fn run<T, F>(&self, label: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if self.is_retryable(&err) && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!("{} attempt {}/{} failed: {}; retrying in {:?}", label, attempt, self.max_attempts, err, delay);
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(StoreError::Backend(msg)) if StoreError::classify(msg.as_str(), &self.markers).is_transient() => {
                    return Err(StoreError::Transient(msg));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO, vec!["nothing found on disk".into()])
    }

    #[test]
    fn backoff_grows_linearly_with_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let calls = Cell::new(0);
        let out = fast(3).run("query", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(StoreError::Transient("Nothing found on disk".into())) } else { Ok(7) }
        });
        assert_eq!(out, Ok(7));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhausted_budget_returns_last_error() {
        let calls = Cell::new(0);
        let out: Result<(), _> = fast(3).run("query", || {
            calls.set(calls.get() + 1);
            Err(StoreError::Transient(format!("fault {}", calls.get())))
        });
        assert_eq!(out, Err(StoreError::Transient("fault 3".into())));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn backend_errors_fail_immediately() {
        let calls = Cell::new(0);
        let out: Result<(), _> = fast(3).run("query", || {
            calls.set(calls.get() + 1);
            Err(StoreError::Backend("schema mismatch".into()))
        });
        assert!(out.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn backend_message_with_marker_is_retried() {
        let calls = Cell::new(0);
        let out = fast(2).run("query", || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 { Err(StoreError::Backend("Nothing found on disk".into())) } else { Ok(()) }
        });
        assert!(out.is_ok());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn exhausted_marker_backend_error_is_reported_transient() {
        let calls = Cell::new(0);
        let out: Result<(), _> = fast(3).run("query", || {
            calls.set(calls.get() + 1);
            Err(StoreError::Backend("Nothing found on disk".into()))
        });
        assert_eq!(out, Err(StoreError::Transient("Nothing found on disk".into())));
        assert_eq!(calls.get(), 3);
    }
}
