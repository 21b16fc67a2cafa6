//! Dependency health subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker transition / recorded outcome (resilience::circuit_breaker)
//!     → HealthReporter (graph.rs)
//!     → own state via state.rs (breaker state + failure count)
//!     → propagate to every dependent in topological order
//!
//! External probe / operator
//!     → HealthGraph::set_state
//!     → same propagation
//! ```
//!
//! # Design Decisions
//! - A dependent is never reported healthier than its worst upstream
//! - Recovery is automatic: once every upstream heals, dependents heal with it
//! - Health is per-dependency, not per-request

pub mod graph;
pub mod state;

pub use graph::{DependencyEdge, GraphError, HealthGraph, HealthGraphBuilder, HealthReporter, NodeIndex};
pub use state::{HealthRecord, HealthState};
