//! Bounded exponential-backoff retry
//!
//! Used for operations that fail while a dependent attachment is still
//! converging on the backend. Only [`ApiError::Transient`] failures consume
//! the attempt budget; a [`ApiError::Permanent`] failure is returned at once.

use crate::api::ApiResult;
use crate::error::ApiError;
use std::future::Future;
use std::time::Duration;

/// Retry configuration for converging operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first call included
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Upper bound of a single delay
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (0-based)
    ///
    /// Never exceeds `max_delay`, whatever the attempt count or multiplier.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::try_from_secs_f64(delay)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget is spent
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!("{} succeeded on attempt {}", operation, attempt);
                }
                return Ok(value);
            }
            Err(err @ ApiError::Permanent(_)) => {
                tracing::warn!("{} failed permanently: {}", operation, err.message());
                return Err(err);
            }
            Err(err) if attempt >= max_attempts => {
                tracing::warn!(
                    "{} failed after {} attempts: {}",
                    operation,
                    attempt,
                    err.message()
                );
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_for_attempt(attempt - 1);
                tracing::debug!(
                    "{} attempt {} failed ({}), retrying in {:?}",
                    operation,
                    attempt,
                    err.message(),
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
