//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: exactly one trial call tests recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: now >= next_attempt (checked on the next call)
//! Half-Open → Closed: trial call succeeds, counter reset to 0
//! Half-Open → Open: trial call fails, cooldown restarts
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency, shared by every caller through `Arc`
//! - All reads and transitions happen under one mutex, so only one caller
//!   can hold the half-open trial permit
//! - Permits are RAII guards. A caller fault releases its permit without
//!   counting; a permit dropped while its call is still in flight (deadline
//!   expiry) counts as a failure, so a dependency that hangs still trips
//! - Observers are notified while the lock is held and must not call back
//!   into the breaker

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::client::ServiceRequest;
use crate::observability::metrics;
use crate::resilience::descriptor::DependencyDescriptor;
use crate::resilience::error::ResilienceError;
use crate::resilience::stage::Call;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives breaker state changes (the health graph implements this).
pub trait BreakerObserver: Send + Sync {
    /// Called on every state transition.
    fn on_transition(&self, from: CircuitState, to: CircuitState, consecutive_failures: u32);

    /// Called after every recorded outcome that did not change the state.
    fn on_outcome(&self, _state: CircuitState, _consecutive_failures: u32) {}
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    pub dependency: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Remaining cooldown while open.
    pub next_attempt_in: Option<Duration>,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    next_attempt: Option<Instant>,
    trial_in_flight: bool,
}

/// Per-dependency circuit breaker.
pub struct CircuitBreaker {
    dependency: String,
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<CircuitInner>,
    observer: Option<Arc<dyn BreakerObserver>>,
}

impl CircuitBreaker {
    pub fn new(dependency: impl Into<String>, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            dependency: dependency.into(),
            failure_threshold: failure_threshold.max(1),
            cooldown,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                next_attempt: None,
                trial_in_flight: false,
            }),
            observer: None,
        }
    }

    pub fn from_descriptor(descriptor: &DependencyDescriptor) -> Self {
        Self::new(descriptor.id.clone(), descriptor.failure_threshold, descriptor.cooldown)
    }

    pub fn with_observer(mut self, observer: Arc<dyn BreakerObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Current state. An elapsed cooldown still reads as `Open` until the
    /// next call claims the trial.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        let now = Instant::now();
        CircuitSnapshot {
            dependency: self.dependency.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            next_attempt_in: match inner.state {
                CircuitState::Open => inner.next_attempt.map(|at| at.saturating_duration_since(now)),
                _ => None,
            },
        }
    }

    /// Ask for permission to call the dependency.
    ///
    /// Fails with `BreakerOpen` while open and cooling down, or while another
    /// caller holds the half-open trial.
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, ResilienceError> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let state = inner.state;

        match state {
            CircuitState::Closed => Ok(self.permit(false)),
            CircuitState::Open => {
                let next_attempt = inner.next_attempt.unwrap_or(now);
                if now >= next_attempt {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.trial_in_flight = true;
                    Ok(self.permit(true))
                } else {
                    metrics::record_short_circuit(&self.dependency);
                    Err(self.rejection(next_attempt - now))
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    metrics::record_short_circuit(&self.dependency);
                    Err(self.rejection(Duration::ZERO))
                } else {
                    inner.trial_in_flight = true;
                    Ok(self.permit(true))
                }
            }
        }
    }

    /// Run `f` under the breaker, recording its outcome.
    ///
    /// Caller faults are neither successes nor failures.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError>>,
    {
        let permit = self.try_acquire()?;
        match f().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(error) => {
                if error.counts_toward_breaker() {
                    permit.fail();
                } else {
                    permit.release();
                }
                Err(error)
            }
        }
    }

    fn permit(&self, trial: bool) -> BreakerPermit<'_> {
        BreakerPermit {
            breaker: self,
            trial,
            settled: false,
        }
    }

    fn rejection(&self, retry_in: Duration) -> ResilienceError {
        ResilienceError::BreakerOpen {
            dependency: self.dependency.clone(),
            retry_in,
        }
    }

    fn record_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        let state = inner.state;
        match state {
            CircuitState::HalfOpen if trial => {
                inner.consecutive_failures = 0;
                inner.trial_in_flight = false;
                inner.next_attempt = None;
                self.transition(&mut inner, CircuitState::Closed);
            }
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                self.notify_outcome(&inner);
            }
            // Late results from permits issued before the breaker opened.
            _ => {}
        }
    }

    fn record_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let state = inner.state;

        match state {
            CircuitState::HalfOpen if trial => {
                inner.trial_in_flight = false;
                self.open(&mut inner);
            }
            CircuitState::Closed if inner.consecutive_failures >= self.failure_threshold => {
                self.open(&mut inner);
            }
            _ => self.notify_outcome(&inner),
        }
    }

    fn release_trial(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.trial_in_flight {
            inner.trial_in_flight = false;
            tracing::debug!(dependency = %self.dependency, "Half-open trial abandoned");
        }
    }

    fn open(&self, inner: &mut CircuitInner) {
        inner.next_attempt = Some(Instant::now() + self.cooldown);
        self.transition(inner, CircuitState::Open);
    }

    fn transition(&self, inner: &mut CircuitInner, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;

        if to == CircuitState::Closed {
            tracing::info!(dependency = %self.dependency, from = %from, to = %to, "Circuit breaker closed");
        } else {
            tracing::warn!(
                dependency = %self.dependency,
                from = %from,
                to = %to,
                consecutive_failures = inner.consecutive_failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "Circuit breaker transition"
            );
        }
        metrics::record_breaker_transition(&self.dependency, to.as_str());

        if let Some(observer) = &self.observer {
            observer.on_transition(from, to, inner.consecutive_failures);
        }
    }

    fn notify_outcome(&self, inner: &CircuitInner) {
        if let Some(observer) = &self.observer {
            observer.on_outcome(inner.state, inner.consecutive_failures);
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("dependency", &self.dependency)
            .field("failure_threshold", &self.failure_threshold)
            .field("cooldown", &self.cooldown)
            .field("state", &self.state())
            .finish()
    }
}

/// Permission to make one call. Settle it with `succeed` or `fail`.
#[must_use = "an unsettled permit records nothing"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl BreakerPermit<'_> {
    /// Whether this permit is the half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success(self.trial);
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.trial);
    }

    /// Give the permit back without recording an outcome.
    pub fn release(mut self) {
        self.settled = true;
        if self.trial {
            self.breaker.release_trial();
        }
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(
                dependency = %self.breaker.dependency,
                trial = self.trial,
                "Call abandoned in flight, counting as failure"
            );
            self.breaker.record_failure(self.trial);
        }
    }
}

/// Pipeline stage guarding every attempt of the wrapped call.
pub struct BreakerStage<C> {
    breaker: Arc<CircuitBreaker>,
    inner: C,
}

impl<C: Call> BreakerStage<C> {
    pub fn new(breaker: Arc<CircuitBreaker>, inner: C) -> Self {
        Self { breaker, inner }
    }
}

#[async_trait]
impl<C: Call> Call for BreakerStage<C> {
    async fn call(&self, request: &ServiceRequest) -> Result<Value, ResilienceError> {
        self.breaker.call(|| self.inner.call(request)).await
    }
}
