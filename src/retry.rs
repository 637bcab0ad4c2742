//! Retry policy shared by the blocking upstream API clients.

use std::thread;
use std::time::Duration;

use reqwest::StatusCode;

/// Capped exponential backoff for transient upstream failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Builds a policy allowing `max_attempts` total tries (at least one).
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// True when another attempt is allowed after `attempt` (zero-based) failed.
    pub fn has_budget(&self, attempt: usize) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Rate limits and server errors are worth retrying; client errors are not.
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    /// Transport-level failures that may succeed on a second try.
    pub fn is_retryable_error(&self, err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
    }

    /// Delay before retry number `attempt` (one-based), doubling up to 32x the base.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        self.base_delay.saturating_mul(1 << capped)
    }

    /// Sleeps the calling (blocking) thread for the backoff of `attempt`.
    pub fn wait(&self, attempt: usize) {
        let delay = self.backoff(attempt);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}
