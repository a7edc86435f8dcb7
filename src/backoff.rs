//! Bounded-retry wrapper around calls to the model provider.
//!
//! Transient failures (rate limits, 5xx, timeouts) are retried with capped
//! exponential delay; permanent failures propagate immediately. Exhausting
//! the attempt budget surfaces exactly one `RateLimitExceeded`, which the
//! calling role translates into `StopReason::RateLimited`.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum BackoffError {
    /// The retry budget was spent on transient failures.
    #[error("rate limit exceeded after {attempts} attempts: {last_error}")]
    RateLimitExceeded { attempts: u32, last_error: String },

    /// A non-transient failure; never retried.
    #[error(transparent)]
    Permanent(ProviderError),
}

/// Retry discipline for one logical provider call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-indexed): base * 2^(retry-1), capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Invoke `call` until it succeeds, fails permanently, or the budget runs out.
pub async fn invoke_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    mut call: F,
) -> Result<T, BackoffError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                last_error = err.to_string();
                if attempt < attempts {
                    let delay = policy.delay_for(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %last_error,
                          "transient provider failure, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
            Err(err) => return Err(BackoffError::Permanent(err)),
        }
    }

    Err(BackoffError::RateLimitExceeded {
        attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 8,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(20), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = invoke_with_backoff(&fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProviderError>("ok".to_string()) }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_retry_then_succeed() {
        let calls = AtomicU32::new(0);
        let result = invoke_with_backoff(&fast_policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::RateLimited("429".into()))
                } else {
                    Ok("recovered".to_string())
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn budget_exhaustion_raises_single_rate_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<String, _> = invoke_with_backoff(&fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Transient("503".into())) }
        })
        .await;
        match result {
            Err(BackoffError::RateLimitExceeded { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RateLimitExceeded, got {other:?}"),
        }
        // No further retries past the budget.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_propagates_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<String, _> = invoke_with_backoff(&fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Permanent("401 unauthorized".into())) }
        })
        .await;
        assert!(matches!(result, Err(BackoffError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
