//! Bounded retry policies.
//!
//! Every polling loop in the workspace (node readiness, receipt polling,
//! graph-node create) runs under one of these instead of looping forever.
//! Callers pick the cadence; the policy owns the bound.

use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::debug;

/// A bounded retry schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Factor applied to the delay after every failed attempt.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // The original tooling polled once a second; 30 attempts bounds the
        // loop at roughly the node startup timeout.
        Self::fixed(Duration::from_secs(1), 30)
    }
}

impl RetryPolicy {
    /// Fixed-interval schedule: `max_attempts` polls spaced by `interval`.
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self { max_attempts, initial_backoff: interval, multiplier: 1.0, max_backoff: interval }
    }

    /// Exponential schedule starting at `initial` and doubling up to `max`.
    pub fn exponential(initial: Duration, max: Duration, max_attempts: u32) -> Self {
        Self { max_attempts, initial_backoff: initial, multiplier: 2.0, max_backoff: max }
    }

    /// Delay to sleep after the given zero-based failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let delay = self.initial_backoff.mul_f64(factor);
        delay.min(self.max_backoff)
    }

    /// Total time the schedule can spend sleeping, useful for log messages.
    pub fn total_delay(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1)).map(|i| self.backoff_for(i)).sum()
    }

    /// Runs `op` until it succeeds or the schedule is exhausted, returning
    /// the last error. Failures before the final attempt are logged at
    /// debug level and slept over.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt + 1 >= self.max_attempts => return Err(err),
                Err(err) => {
                    debug!(
                        "{what} failed (attempt {}/{}): {err}",
                        attempt + 1,
                        self.max_attempts
                    );
                    sleep(self.backoff_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
