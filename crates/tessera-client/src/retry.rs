//! Retry logic with exponential backoff.
//!
//! Transient transport failures (endpoint restarting, per-batch timeout,
//! backpressure) are worth one or a few retries; everything else is
//! propagated immediately. Backoff doubles per attempt up to a cap, with
//! optional jitter to avoid thundering-herd retries after a shared outage.
//!
//! The write path deliberately uses [`RetryPolicy::single`]: a failed batch
//! may be resent at most once, and only when the transport reports an
//! idempotent-retryable code - the server deduplicates at batch granularity
//! but the sequence contract is at-least-once, not exactly-once.

use crate::transport::{TransportCode, TransportError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration for exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts.
    pub max_retries: usize,

    /// Initial backoff duration.
    pub initial_backoff: Duration,

    /// Maximum backoff duration.
    pub max_backoff: Duration,

    /// Backoff multiplier for exponential growth.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_retries: usize,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// The write-path policy: one retry, short backoff.
    pub fn single() -> Self {
        Self {
            max_retries: 1,
            ..Self::default()
        }
    }

    /// Backoff duration for a 0-indexed attempt:
    /// `min(initial * multiplier^attempt, max)`.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }

    /// Whether an error is transient and worth retrying.
    pub fn is_retryable(&self, error: &TransportError) -> bool {
        matches!(
            error.code,
            TransportCode::Unavailable
                | TransportCode::DeadlineExceeded
                | TransportCode::ResourceExhausted
                | TransportCode::Internal
        )
    }
}

/// Retries an operation with exponential backoff.
///
/// Non-retryable errors and exhausted budgets return the last error.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if !policy.is_retryable(&error) {
                    return Err(error);
                }
                if attempt >= policy.max_retries {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        error = %error,
                        "Max retries exhausted, giving up"
                    );
                    return Err(error);
                }

                let backoff = policy.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "Retryable error, backing off"
                );
                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// Retries with jittered backoff (0.75x-1.25x) to spread out concurrent
/// retries after a shared failure.
pub async fn retry_with_jittered_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if !policy.is_retryable(&error) {
                    return Err(error);
                }
                if attempt >= policy.max_retries {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        error = %error,
                        "Max retries exhausted, giving up"
                    );
                    return Err(error);
                }

                let backoff = policy.backoff(attempt);
                let jitter = 0.75 + (rand::random::<f64>() * 0.5);
                let jittered = Duration::from_millis((backoff.as_millis() as f64 * jitter) as u64);
                warn!(
                    attempt = attempt + 1,
                    backoff_ms = jittered.as_millis() as u64,
                    error = %error,
                    "Retryable error, backing off"
                );
                sleep(jittered).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_growth_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(30), policy.max_backoff);
    }

    #[test]
    fn test_retryable_classification() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&TransportError::unavailable("down")));
        assert!(policy.is_retryable(&TransportError::internal("oops")));
        assert!(!policy.is_retryable(&TransportError::not_found("missing")));
        assert!(!policy.is_retryable(&TransportError::invalid_argument("bad")));
        assert!(!policy.is_retryable(&TransportError::cancelled("closed")));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(5), 2.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_op = Arc::clone(&calls);

        let result = retry_with_backoff(&policy, move || {
            let calls = Arc::clone(&calls_in_op);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TransportError::unavailable("flaky"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_op = Arc::clone(&calls);

        let result: Result<(), _> = retry_with_backoff(&policy, move || {
            let calls = Arc::clone(&calls_in_op);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::not_found("missing"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_policy_allows_one_retry() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            ..RetryPolicy::single()
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_op = Arc::clone(&calls);

        let result: Result<(), _> = retry_with_backoff(&policy, move || {
            let calls = Arc::clone(&calls_in_op);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::unavailable("still down"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
