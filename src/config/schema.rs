//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! resilience core. All types derive Serde traits for deserialization from
//! config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::health::{GraphError, HealthGraph};
use crate::resilience::DependencyDescriptor;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Listener configuration for the HTTP surface.
    pub listener: ListenerConfig,

    /// Per-operation deadlines.
    pub deadlines: DeadlineConfig,

    /// Response cache settings shared by every dependency.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Protected dependencies and graph-only nodes.
    pub dependencies: Vec<DependencyConfig>,

    /// Upstream → dependent edges of the health graph.
    pub edges: Vec<EdgeConfig>,

    /// Logical operations and the dependency each one calls.
    pub operations: Vec<OperationConfig>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            deadlines: DeadlineConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
            dependencies: vec![
                DependencyConfig {
                    critical: true,
                    ..DependencyConfig::new("ai_generation", Some("http://127.0.0.1:7101/generate"))
                },
                DependencyConfig {
                    critical: true,
                    cache_ttl_secs: 300,
                    ..DependencyConfig::new("flight_search", Some("http://127.0.0.1:7102/search"))
                },
                DependencyConfig {
                    cache_ttl_secs: 900,
                    ..DependencyConfig::new("hotel_search", Some("http://127.0.0.1:7103/search"))
                },
            ],
            edges: Vec::new(),
            operations: default_operations(),
        }
    }
}

impl ResilienceConfig {
    pub fn dependency(&self, id: &str) -> Option<&DependencyConfig> {
        self.dependencies.iter().find(|d| d.id == id)
    }

    /// Health graph of the configured dependencies and edges.
    pub fn health_graph(&self) -> Result<HealthGraph, GraphError> {
        let graph = self
            .dependencies
            .iter()
            .fold(HealthGraph::builder(), |b, d| b.dependency(d.id.clone(), d.failure_threshold));
        self.edges
            .iter()
            .fold(graph, |b, e| b.edge(e.upstream.clone(), e.dependent.clone()))
            .build()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout applied by the HTTP layer, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Deadline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Deadline of one logical operation (all attempts included), in milliseconds.
    pub operation_ms: u64,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self { operation_ms: 10_000 }
    }
}

impl DeadlineConfig {
    pub fn operation(&self) -> Duration {
        Duration::from_millis(self.operation_ms)
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Bound on a single cache backend read or write, in milliseconds.
    pub backend_timeout_ms: u64,

    /// Interval between expired-entry sweeps, in seconds (0 disables the sweep).
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend_timeout_ms: 250,
            sweep_interval_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One dependency.
///
/// A dependency without an endpoint is a health-graph node only (a database
/// or queue whose state is set externally).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyConfig {
    /// Unique dependency identifier.
    pub id: String,

    /// URL the HTTP adapter posts requests to.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-attempt HTTP timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Consecutive counted failures that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Open-state cooldown in milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter as a fraction of the computed delay (0.0 - 1.0).
    #[serde(default)]
    pub jitter_ratio: f64,

    /// Cached response lifetime in seconds (0 disables caching).
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Trip plans are unusable without a result from this dependency.
    #[serde(default)]
    pub critical: bool,

    /// Serve the fallback directly while an upstream is unhealthy.
    #[serde(default)]
    pub shed_on_upstream_failure: bool,
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_cache_ttl_secs() -> u64 {
    3_600
}

impl DependencyConfig {
    pub fn new(id: impl Into<String>, endpoint: Option<&str>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.map(str::to_string),
            request_timeout_ms: default_request_timeout_ms(),
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ratio: 0.0,
            cache_ttl_secs: default_cache_ttl_secs(),
            critical: false,
            shed_on_upstream_failure: false,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn descriptor(&self) -> DependencyDescriptor {
        DependencyDescriptor {
            id: self.id.clone(),
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_millis(self.cooldown_ms),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_ratio: self.jitter_ratio,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            critical: self.critical,
            shed_on_upstream_failure: self.shed_on_upstream_failure,
        }
    }
}

/// Health graph edge: `dependent` relies on `upstream`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EdgeConfig {
    pub upstream: String,
    pub dependent: String,
}

/// Logical operation routed to one dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperationConfig {
    /// Operation name (e.g., "search_flights").
    pub name: String,

    /// Dependency that serves it.
    pub dependency: String,
}

fn default_operations() -> Vec<OperationConfig> {
    [
        ("generate_itinerary", "ai_generation"),
        ("search_flights", "flight_search"),
        ("search_hotels", "hotel_search"),
    ]
    .into_iter()
    .map(|(name, dependency)| OperationConfig {
        name: name.to_string(),
        dependency: dependency.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_dependency_uses_defaults() {
        let config: ResilienceConfig = toml::from_str(
            r#"
            [[dependencies]]
            id = "ai_generation"
            endpoint = "http://ai.internal/generate"
            "#,
        )
        .unwrap();

        let dep = &config.dependencies[0];
        assert_eq!(dep.failure_threshold, 5);
        assert_eq!(dep.cooldown_ms, 30_000);
        assert_eq!(dep.cache_ttl_secs, 3_600);
        assert_eq!(config.operations.len(), 3);
        assert_eq!(config.deadlines.operation_ms, 10_000);
    }

    #[test]
    fn test_descriptor_conversion() {
        let dep = DependencyConfig {
            failure_threshold: 3,
            cooldown_ms: 5_000,
            max_retries: 1,
            ..DependencyConfig::new("flight_search", None)
        };
        let descriptor = dep.descriptor();
        assert_eq!(descriptor.failure_threshold, 3);
        assert_eq!(descriptor.cooldown, Duration::from_secs(5));
        assert_eq!(descriptor.max_retries, 1);
        assert_eq!(descriptor.base_delay, Duration::from_millis(200));
    }

    #[test]
    fn test_default_config_routes_travel_operations() {
        let config = ResilienceConfig::default();
        for op in &config.operations {
            assert!(config.dependencies.iter().any(|d| d.id == op.dependency));
        }
    }
}
