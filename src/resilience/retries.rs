//! Retry policy executor.
//!
//! # Responsibilities
//! - Re-run a failed call while its error is retryable
//! - Bound total attempts to `max_retries + 1`
//! - Wait with exponential backoff, or the server's `Retry-After`
//!
//! # Design Decisions
//! - Fatal errors (caller faults, permanent failures, open breaker) stop
//!   the loop immediately
//! - Delays suspend the task with `tokio::time::sleep`; the surrounding
//!   deadline can cancel the wait
//! - The last error is returned unchanged once retries are exhausted

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::ServiceRequest;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::descriptor::DependencyDescriptor;
use crate::resilience::error::ResilienceError;
use crate::resilience::stage::Call;

/// Retry settings for one dependency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            jitter_ratio: 0.0,
        }
    }

    pub fn from_descriptor(descriptor: &DependencyDescriptor) -> Self {
        Self {
            max_retries: descriptor.max_retries,
            base_delay: descriptor.base_delay,
            max_delay: descriptor.max_delay,
            jitter_ratio: descriptor.jitter_ratio,
        }
    }

    /// Total attempts allowed for one logical call.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before retrying after failed attempt `attempt`.
    pub fn delay_for(&self, attempt: u32, error: &ResilienceError) -> Duration {
        error
            .retry_after()
            .unwrap_or_else(|| calculate_backoff(attempt, self.base_delay, self.max_delay, self.jitter_ratio))
    }
}

/// A failed attempt that will be retried.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    pub attempt: u32,
    pub delay: Duration,
    pub error: ResilienceError,
}

/// Pipeline stage re-running the wrapped call on retryable failures.
pub struct RetryStage<C> {
    dependency: String,
    policy: RetryPolicy,
    inner: C,
}

impl<C: Call> RetryStage<C> {
    pub fn new(dependency: impl Into<String>, policy: RetryPolicy, inner: C) -> Self {
        Self {
            dependency: dependency.into(),
            policy,
            inner,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<C: Call> Call for RetryStage<C> {
    async fn call(&self, request: &ServiceRequest) -> Result<Value, ResilienceError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self.inner.call(request).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(dependency = %self.dependency, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }

            if attempt >= self.policy.max_attempts() {
                tracing::warn!(
                    dependency = %self.dependency,
                    attempts = attempt,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(error);
            }

            let retry = RetryAttempt {
                attempt,
                delay: self.policy.delay_for(attempt, &error),
                error,
            };
            tracing::info!(
                dependency = %self.dependency,
                attempt = retry.attempt,
                delay = ?retry.delay,
                kind = retry.error.label(),
                "Retrying call"
            );
            metrics::record_retry(&self.dependency, retry.error.label());
            tokio::time::sleep(retry.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClassifiedError;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Replays a script of outcomes, then succeeds.
    struct Scripted {
        outcomes: Mutex<VecDeque<ClassifiedError>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(outcomes: Vec<ClassifiedError>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Call for Scripted {
        async fn call(&self, _request: &ServiceRequest) -> Result<Value, ResilienceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcomes.lock().pop_front() {
                Some(err) => Err(ResilienceError::service("flight_search", err)),
                None => Ok(json!({ "flights": [] })),
            }
        }
    }

    fn request() -> ServiceRequest {
        ServiceRequest::new("search_flights", json!({ "origin": "LIS" }))
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(100), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_retries() {
        let inner = Scripted::new(vec![
            ClassifiedError::transient("reset 1"),
            ClassifiedError::transient("reset 2"),
            ClassifiedError::transient("reset 3"),
        ]);
        let stage = RetryStage::new("flight_search", policy(2), inner);

        let err = stage.call(&request()).await.unwrap_err();
        assert_eq!(stage.inner.calls.load(Ordering::SeqCst), 3);
        match err {
            ResilienceError::Service { source, .. } => assert_eq!(source.message, "reset 3"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_within_budget() {
        let inner = Scripted::new(vec![ClassifiedError::unavailable("503")]);
        let stage = RetryStage::new("flight_search", policy(2), inner);

        let start = Instant::now();
        assert!(stage.call(&request()).await.is_ok());
        assert_eq!(stage.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_errors_are_not_retried() {
        for fatal in [ClassifiedError::validation("bad"), ClassifiedError::permanent("garbage")] {
            let stage = RetryStage::new("flight_search", policy(3), Scripted::new(vec![fatal]));
            assert!(stage.call(&request()).await.is_err());
            assert_eq!(stage.inner.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_overrides_backoff() {
        let inner = Scripted::new(vec![ClassifiedError::rate_limited(
            "slow down",
            Some(Duration::from_secs(3)),
        )]);
        let stage = RetryStage::new("flight_search", policy(1), inner);

        let start = Instant::now();
        assert!(stage.call(&request()).await.is_ok());
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_between_attempts() {
        let inner = Scripted::new(vec![
            ClassifiedError::transient("1"),
            ClassifiedError::transient("2"),
            ClassifiedError::transient("3"),
        ]);
        let stage = RetryStage::new("flight_search", policy(3), inner);

        let start = Instant::now();
        assert!(stage.call(&request()).await.is_ok());
        // 100ms + 200ms + 400ms
        assert_eq!(start.elapsed(), Duration::from_millis(700));
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        assert_eq!(policy(0).max_attempts(), 1);
    }
}
