//! Travel Resilience Core Library
//!
//! Coordinates calls to failure-prone travel dependencies (AI itinerary
//! generation, flight search, hotel search) behind circuit breakers, bounded
//! retries, a response cache, fallbacks and a dependency health graph.

pub mod cache;
pub mod client;
pub mod config;
pub mod fallback;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod orchestrator;
pub mod resilience;

pub use config::ResilienceConfig;
pub use fallback::Outcome;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use orchestrator::Orchestrator;
