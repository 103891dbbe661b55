//! Retry Policy
//!
//! Bounded exponential backoff for transient provider failures. Retries stay
//! inside a single backend call and are invisible to callers.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;

use crate::types::LlmResult;

/// Backoff settings for provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn backoff(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempt cap is hit.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> LlmResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LlmResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0u32;

    backoff::future::retry(policy.backoff(), || {
        attempts += 1;
        let attempt = attempts;
        let fut = op();
        async move {
            match fut.await {
                Ok(value) => Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(call = label, attempt, error = %err, "transient failure, retrying");
                    Err(backoff::Error::transient(err))
                }
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        }
    })
    .await
}
