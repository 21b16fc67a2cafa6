//! HTTP surface of the resilience core.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID, timeout, trace layers)
//!     → handlers.rs (decode + validate body)
//!     → Orchestrator (cache / breaker / retry / fallback)
//!     → JSON outcome, or an error mapped to 400 / 404 / 502 / 503 / 504
//! ```

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};
