//! Per-dependency resilience settings.

use std::time::Duration;

/// Immutable description of how one dependency is protected.
///
/// Built once at startup (usually from `DependencyConfig`) and shared by the
/// breaker, retry policy and cache of that dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyDescriptor {
    pub id: String,
    /// Consecutive counted failures that open the breaker.
    pub failure_threshold: u32,
    /// Time the breaker stays open before admitting a trial call.
    pub cooldown: Duration,
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the computed delay added as random jitter (0 disables).
    pub jitter_ratio: f64,
    /// Lifetime of cached responses. Zero disables caching.
    pub cache_ttl: Duration,
    /// A plan is only usable when every critical dependency produced a result.
    pub critical: bool,
    /// Go straight to the fallback while an upstream is unhealthy.
    pub shed_on_upstream_failure: bool,
}

impl DependencyDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter_ratio: 0.0,
            cache_ttl: Duration::from_secs(3600),
            critical: false,
            shed_on_upstream_failure: false,
        }
    }

    /// Failures at which the dependency is reported degraded while still closed.
    pub fn degraded_threshold(&self) -> u32 {
        degraded_threshold(self.failure_threshold)
    }
}

/// Half the breaker threshold, rounded up, and never below one.
pub fn degraded_threshold(failure_threshold: u32) -> u32 {
    failure_threshold.div_ceil(2).max(1)
}
