//! Service client adapters.
//!
//! # Data Flow
//! ```text
//! ServiceRequest (operation + JSON payload)
//!     → ServiceClient::call (one external dependency)
//!     → Ok(JSON payload) | Err(ClassifiedError)
//! ```
//!
//! # Design Decisions
//! - One client per dependency; clients know nothing about retries or breakers
//! - Every failure is classified at the edge (types.rs) so the resilience
//!   stages can decide on retries and fallbacks without inspecting transports
//! - Payloads are JSON values; domain shapes live with the orchestrator

pub mod http;
pub mod types;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use http::HttpServiceClient;
pub use types::{classify_status, ClassifiedError, ErrorKind};

/// A single request to an external dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRequest {
    /// Logical operation name (e.g. `generate_itinerary`).
    pub operation: String,
    /// Request body forwarded to the dependency.
    pub payload: Value,
}

impl ServiceRequest {
    pub fn new(operation: impl Into<String>, payload: Value) -> Self {
        Self {
            operation: operation.into(),
            payload,
        }
    }
}

/// Uniform call signature implemented by every dependency adapter.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Identifier of the dependency behind this client.
    fn dependency(&self) -> &str;

    /// Perform one call attempt.
    async fn call(&self, request: &ServiceRequest) -> Result<Value, ClassifiedError>;
}
