//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, retries, caches, fallbacks and the health graph produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Prometheus scrape endpoint
//! ```

pub mod logging;
pub mod metrics;
