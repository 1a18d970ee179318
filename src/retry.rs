//! Bounded retry with exponential backoff.
//!
//! A [`RetryPolicy`] wraps any async operation: the operation runs up to
//! `max_attempts` times, sleeping `base_delay × 2^(n-1)` (capped at
//! `max_delay`) after the n-th failure, as long as the caller's predicate
//! says the error is retryable. Non-retryable errors return immediately.
//!
//! With the default ingest settings (3 attempts, 1 s base) the schedule is:
//! attempt, 1 s, attempt, 2 s, attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::IngestConfig;

const MAX_BACKOFF: Duration = Duration::from_secs(32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// A policy making at most `max_attempts` calls (minimum 1).
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: MAX_BACKOFF,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
        )
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep after the `failed_attempt`-th failure (1-based).
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. The closure receives the 1-based
    /// attempt number.
    pub async fn run<T, E, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && is_retryable(&err) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}
