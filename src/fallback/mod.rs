//! Fallback and degradation subsystem.
//!
//! # Data Flow
//! ```text
//! Protected call exhausted / breaker open / deadline exceeded
//!     → registry.rs (strategy lookup by operation)
//!     → types.rs FallbackResult (provenance = fallback, confidence < 1.0)
//! Caller faults never reach this module.
//! ```

pub mod registry;
pub mod types;

pub use registry::{FallbackContext, FallbackPayload, FallbackRegistry, FallbackStrategy, StaticFallback};
pub use types::{FallbackResult, Outcome, PrimaryResult, Provenance, MAX_FALLBACK_CONFIDENCE, PRIMARY_CONFIDENCE};
