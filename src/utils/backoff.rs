//! Retry policy with exponential backoff.
//!
//! One policy type serves both the scheduler (re-probing a failed service
//! within a cycle) and the alert dispatcher (re-delivering a notification).

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::utils::constants::*;

// ═══════════════════════════════════════════════════════════════════════════════
// BACKOFF POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded retry policy: `max_attempts` tries, delays growing by `multiplier`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt (milliseconds)
    pub base_delay_ms: u64,
    /// Growth factor applied per failed attempt
    pub multiplier: f64,
    /// Cap on any single delay (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_DELIVERY_ATTEMPTS,
            base_delay_ms: DEFAULT_DELIVERY_BASE_DELAY_MS,
            multiplier: 2.0,
            max_delay_ms: DEFAULT_DELIVERY_MAX_DELAY_MS,
        }
    }
}

impl BackoffPolicy {
    /// Single attempt, never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Create a policy with explicit values
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            multiplier,
            max_delay_ms: max_delay.as_millis() as u64,
        }
    }

    /// Delay to wait after the failed attempt with index `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let raw = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Validate policy values
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::setting(
                format!("{}.max_attempts", name),
                "must be at least 1",
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::setting(
                format!("{}.multiplier", name),
                "must be a finite number >= 1.0",
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::setting(
                format!("{}.max_delay_ms", name),
                "must not be smaller than base_delay_ms",
            ));
        }
        Ok(())
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    ///
    /// The closure receives the 0-based attempt index.
    pub async fn retry<T, E, F, Fut, R>(
        &self,
        label: &str,
        mut operation: F,
        is_retryable: R,
    ) -> std::result::Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let attempts = attempt + 1;
                    if attempts >= max_attempts || !is_retryable(&err) {
                        return Err(RetryError { attempts, last: err });
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = label,
                        attempt = attempts,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed, retrying: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Error returned once a retried operation gives up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError<E> {
    /// Attempts actually made
    pub attempts: u32,
    /// Error from the final attempt
    pub last: E,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gave up after {} attempts: {}", self.attempts, self.last)
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}
