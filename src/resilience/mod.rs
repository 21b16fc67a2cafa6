//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Protected call for one dependency:
//!     → timeouts.rs (deadline over the whole operation)
//!     → retries.rs (retry retryable failures with backoff)
//!     → circuit_breaker.rs (permit per attempt, track failures)
//!     → stage.rs AdapterStage (one call to the ServiceClient)
//! ```
//!
//! # Design Decisions
//! - Every stage implements the same `Call` trait and wraps the next one
//! - The breaker sits inside the retry loop, so an opening breaker stops
//!   further retries and no attempt reaches an open dependency
//! - Timeouts are non-negotiable; every operation has a deadline

pub mod backoff;
pub mod circuit_breaker;
pub mod descriptor;
pub mod error;
pub mod retries;
pub mod stage;
pub mod timeouts;

pub use circuit_breaker::{BreakerObserver, BreakerStage, CircuitBreaker, CircuitSnapshot, CircuitState};
pub use descriptor::DependencyDescriptor;
pub use error::ResilienceError;
pub use retries::{RetryPolicy, RetryStage};
pub use stage::{AdapterStage, Call};
pub use timeouts::with_deadline;
