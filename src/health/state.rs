//! Dependency health state.
//!
//! # States
//! - Healthy: dependency and all of its upstreams are fine
//! - Degraded: failures are elevated (below the breaker threshold), the
//!   breaker is probing recovery, or an upstream is degraded
//! - Unhealthy: the breaker is open, or an upstream is unhealthy
//!
//! # Design Decisions
//! - States are ordered so that "worst" is simply `max`
//! - Stored as `u8` in atomics by the graph

use serde::{Deserialize, Serialize};

use crate::resilience::descriptor::degraded_threshold;
use crate::resilience::CircuitState;

/// Health of one dependency.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy = 0,
    Degraded = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            0 => HealthState::Healthy,
            1 => HealthState::Degraded,
            _ => HealthState::Unhealthy,
        }
    }
}

impl HealthState {
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }

    /// Own health implied by a breaker's state and failure count.
    pub fn from_breaker(state: CircuitState, consecutive_failures: u32, failure_threshold: u32) -> Self {
        match state {
            CircuitState::Open => Self::Unhealthy,
            CircuitState::HalfOpen => Self::Degraded,
            CircuitState::Closed if consecutive_failures >= degraded_threshold(failure_threshold) => Self::Degraded,
            CircuitState::Closed => Self::Healthy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible health of one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthRecord {
    pub dependency: String,
    pub consecutive_failures: u32,
    /// Effective state after propagation.
    pub state: HealthState,
    /// State from the dependency's own breaker (or manual override).
    pub own_state: HealthState,
    /// Worst upstream, when it is what drags this dependency down.
    pub impaired_by: Option<String>,
}
