//! Retry with backoff.
//!
//! `retry_with` runs an async operation up to `max_attempts` times, sleeping
//! according to the policy's backoff between attempts. Sleeps use tokio time
//! so tests can run them on a paused clock.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately
    None,
    /// The n-th retry waits `step * n`
    Linear(Duration),
    /// The n-th retry waits `factor * 2^(n-1)`
    Exponential(Duration),
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Linear(step) => step * retry,
            Self::Exponential(factor) => factor * 2u32.saturating_pow(retry.saturating_sub(1)),
        }
    }
}

/// Attempt budget plus backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Linear schedule, as used after each resolver miss.
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self::new(max_attempts, Backoff::Linear(step))
    }

    /// Exponential schedule, as used by the HTTP transport.
    pub fn exponential(max_attempts: u32, factor: Duration) -> Self {
        Self::new(max_attempts, Backoff::Exponential(factor))
    }

    /// Sum of all sleeps when every attempt fails.
    pub fn total_delay(&self) -> Duration {
        (1..self.max_attempts).map(|n| self.backoff.delay(n)).sum()
    }
}

/// Run `op` until it succeeds, returns a non-retryable error, or the budget runs out.
///
/// `op` receives the 1-based attempt number. The last error is returned on exhaustion.
pub async fn retry_with<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = policy.backoff.delay(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after backoff");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
