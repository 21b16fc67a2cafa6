//! Orchestrator: composes the resilience stages into logical operations.
//!
//! # Data Flow
//! ```text
//! execute(operation, payload)
//!     → route to the dependency pipeline
//!     → cache lookup (hit → Outcome::Primary, provenance = cache)
//!     → shed if an upstream made the dependency unhealthy (optional)
//!     → deadline(RetryStage(BreakerStage(AdapterStage)))
//!         Ok    → write-through cache → Outcome::Primary
//!         Err   → caller fault        → error returned as is
//!               → anything else       → fallback registry → Outcome::Fallback
//!                                       (or the original error)
//! ```
//!
//! # Design Decisions
//! - One pipeline per dependency; several operations may share it
//! - The registry, cache and health graph are shared by all pipelines
//! - Each operation gets its own id and tracing span

pub mod pipeline;
pub mod travel;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::cache::{fingerprint, CacheStatsSnapshot, ResponseCache};
use crate::client::{HttpServiceClient, ServiceClient, ServiceRequest};
use crate::config::ResilienceConfig;
use crate::fallback::{FallbackContext, FallbackRegistry, Outcome, PrimaryResult};
use crate::health::{GraphError, HealthGraph, HealthGraphBuilder, HealthRecord, HealthState};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::{with_deadline, CircuitSnapshot, DependencyDescriptor, ResilienceError};

pub use pipeline::Pipeline;

/// Default deadline of one logical operation.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Errors raised while assembling an orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("operation {operation} routes to {dependency}, which has no client")]
    UnroutableOperation { operation: String, dependency: String },

    #[error("operation {0} is routed twice")]
    DuplicateOperation(String),

    #[error("invalid endpoint for {dependency}: {source}")]
    InvalidEndpoint {
        dependency: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client for {dependency}: {source}")]
    Client {
        dependency: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Answer of `get_health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Worst effective state over all dependencies.
    pub status: HealthState,
    pub dependencies: BTreeMap<String, HealthRecord>,
    pub breakers: BTreeMap<String, CircuitSnapshot>,
    pub cache: CacheStatsSnapshot,
}

/// Entry point for every protected operation.
pub struct Orchestrator {
    pipelines: Vec<Pipeline>,
    routes: HashMap<String, usize>,
    cache: ResponseCache,
    fallbacks: FallbackRegistry,
    graph: Arc<HealthGraph>,
    deadline: Duration,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Assemble HTTP-backed pipelines from a validated configuration.
    pub fn from_config(config: &ResilienceConfig, fallbacks: FallbackRegistry) -> Result<Self, OrchestratorError> {
        let cache = ResponseCache::in_memory().with_op_timeout(Duration::from_millis(config.cache.backend_timeout_ms));
        let mut builder = Self::builder()
            .deadline(config.deadlines.operation())
            .cache(cache)
            .fallbacks(fallbacks);

        for dep in &config.dependencies {
            let Some(endpoint) = &dep.endpoint else {
                builder = builder.node(dep.id.clone());
                continue;
            };
            let endpoint = Url::parse(endpoint).map_err(|source| OrchestratorError::InvalidEndpoint {
                dependency: dep.id.clone(),
                source,
            })?;
            let client = HttpServiceClient::new(dep.id.clone(), endpoint, dep.request_timeout()).map_err(|source| {
                OrchestratorError::Client {
                    dependency: dep.id.clone(),
                    source,
                }
            })?;
            builder = builder.dependency(dep.descriptor(), Arc::new(client));
        }

        for edge in &config.edges {
            builder = builder.edge(edge.upstream.clone(), edge.dependent.clone());
        }
        for op in &config.operations {
            builder = builder.route(op.name.clone(), op.dependency.clone());
        }

        builder.build()
    }

    /// Run `operation` through its dependency pipeline.
    pub async fn execute(&self, operation: &str, payload: Value) -> Result<Outcome, ResilienceError> {
        let pipeline = self
            .pipeline_for(operation)
            .ok_or_else(|| ResilienceError::UnknownOperation(operation.to_string()))?;

        let span = tracing::info_span!(
            "operation",
            op_id = %Uuid::new_v4(),
            operation,
            dependency = %pipeline.dependency()
        );
        self.run(pipeline, operation, payload).instrument(span).await
    }

    async fn run(&self, pipeline: &Pipeline, operation: &str, payload: Value) -> Result<Outcome, ResilienceError> {
        let dependency = pipeline.dependency();
        let ttl = pipeline.descriptor().cache_ttl;
        let key = fingerprint(operation, &payload);

        if !ttl.is_zero() {
            if let Some(value) = self.cache.lookup(&key).await {
                metrics::record_call(dependency, "cache_hit");
                return Ok(Outcome::Primary(PrimaryResult::cached(operation, value)));
            }
        }

        let request = ServiceRequest::new(operation, payload);
        let result = match self.shed(pipeline) {
            Some(error) => Err(error),
            None => with_deadline(operation, self.deadline, pipeline.call().call(&request)).await,
        };

        match result {
            Ok(value) => {
                self.cache.store(key, value.clone(), ttl).await;
                metrics::record_call(dependency, "success");
                Ok(Outcome::Primary(PrimaryResult::fresh(operation, value)))
            }
            Err(error) if error.is_caller_fault() => {
                metrics::record_call(dependency, "rejected");
                tracing::debug!(error = %error, "Request rejected");
                Err(error)
            }
            Err(error) => self.degrade(dependency, &request, error),
        }
    }

    /// Skip the call when an upstream, not the dependency itself, is unhealthy.
    fn shed(&self, pipeline: &Pipeline) -> Option<ResilienceError> {
        if !pipeline.descriptor().shed_on_upstream_failure {
            return None;
        }
        let node = pipeline.node();
        if self.graph.state(node) != HealthState::Unhealthy {
            return None;
        }
        let upstream = self.graph.impaired_by(node)?;
        Some(ResilienceError::UpstreamUnavailable {
            dependency: pipeline.dependency().to_string(),
            upstream: self.graph.id(upstream).to_string(),
        })
    }

    fn degrade(
        &self,
        dependency: &str,
        request: &ServiceRequest,
        error: ResilienceError,
    ) -> Result<Outcome, ResilienceError> {
        let ctx = FallbackContext {
            operation: &request.operation,
            dependency,
            request: &request.payload,
            error: &error,
        };

        match self.fallbacks.resolve(&ctx) {
            Some(result) => {
                metrics::record_fallback(&request.operation, error.label());
                metrics::record_call(dependency, "fallback");
                tracing::warn!(error = %error, confidence = result.confidence, "Serving fallback result");
                Ok(Outcome::Fallback(result))
            }
            None => {
                metrics::record_call(dependency, "failure");
                tracing::warn!(error = %error, "Operation failed with no fallback registered");
                Err(error)
            }
        }
    }

    /// Health of every dependency plus breaker and cache state.
    pub fn get_health(&self) -> HealthReport {
        let dependencies = self.graph.snapshot();
        let status = dependencies
            .values()
            .map(|r| r.state)
            .max()
            .unwrap_or(HealthState::Healthy);

        HealthReport {
            status,
            dependencies,
            breakers: self
                .pipelines
                .iter()
                .map(|p| (p.dependency().to_string(), p.breaker().snapshot()))
                .collect(),
            cache: self.cache.stats(),
        }
    }

    /// Override the own health of a dependency (probe results, graph-only nodes).
    pub fn set_health(&self, dependency: &str, state: HealthState) -> Result<(), GraphError> {
        self.graph.set_state(dependency, state)
    }

    pub fn health_graph(&self) -> &Arc<HealthGraph> {
        &self.graph
    }

    pub fn breaker_snapshot(&self, dependency: &str) -> Option<CircuitSnapshot> {
        self.pipelines
            .iter()
            .find(|p| p.dependency() == dependency)
            .map(|p| p.breaker().snapshot())
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    pub fn purge_cache(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn descriptor_for(&self, operation: &str) -> Option<&DependencyDescriptor> {
        self.pipeline_for(operation).map(Pipeline::descriptor)
    }

    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    fn pipeline_for(&self, operation: &str) -> Option<&Pipeline> {
        self.routes.get(operation).map(|&i| &self.pipelines[i])
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pipelines", &self.pipelines)
            .field("routes", &self.routes)
            .field("fallbacks", &self.fallbacks)
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Periodically sweep expired cache entries until shutdown.
pub fn spawn_cache_sweeper(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    shutdown: Arc<Shutdown>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = orchestrator.purge_cache();
                    if purged > 0 {
                        tracing::debug!(purged, "Cache sweep finished");
                    }
                }
                _ = shutdown.wait() => {
                    tracing::debug!("Cache sweeper stopping");
                    return;
                }
            }
        }
    })
}

/// Collects dependencies, graph edges and routes.
pub struct OrchestratorBuilder {
    deadline: Duration,
    cache: Option<ResponseCache>,
    fallbacks: FallbackRegistry,
    dependencies: Vec<(DependencyDescriptor, Arc<dyn ServiceClient>)>,
    graph: HealthGraphBuilder,
    routes: Vec<(String, String)>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            cache: None,
            fallbacks: FallbackRegistry::new(),
            dependencies: Vec::new(),
            graph: HealthGraphBuilder::default(),
            routes: Vec::new(),
        }
    }
}

impl OrchestratorBuilder {
    /// Add a protected dependency.
    pub fn dependency(mut self, descriptor: DependencyDescriptor, client: Arc<dyn ServiceClient>) -> Self {
        self.graph = std::mem::take(&mut self.graph).dependency(descriptor.id.clone(), descriptor.failure_threshold);
        self.dependencies.push((descriptor, client));
        self
    }

    /// Add a graph-only dependency (no client, state set externally).
    pub fn node(mut self, id: impl Into<String>) -> Self {
        self.graph = std::mem::take(&mut self.graph).node(id);
        self
    }

    pub fn edge(mut self, upstream: impl Into<String>, dependent: impl Into<String>) -> Self {
        self.graph = std::mem::take(&mut self.graph).edge(upstream, dependent);
        self
    }

    /// Serve `operation` through `dependency`.
    pub fn route(mut self, operation: impl Into<String>, dependency: impl Into<String>) -> Self {
        self.routes.push((operation.into(), dependency.into()));
        self
    }

    pub fn fallbacks(mut self, fallbacks: FallbackRegistry) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        let graph = Arc::new(self.graph.build()?);

        let pipelines: Vec<Pipeline> = self
            .dependencies
            .into_iter()
            .map(|(descriptor, client)| {
                // Every dependency was added to the graph above.
                let node = graph
                    .index_of(&descriptor.id)
                    .ok_or_else(|| GraphError::UnknownDependency(descriptor.id.clone()))?;
                Ok(Pipeline::new(descriptor, client, graph.clone(), node))
            })
            .collect::<Result<_, GraphError>>()?;

        let mut routes = HashMap::with_capacity(self.routes.len());
        for (operation, dependency) in self.routes {
            let index = pipelines
                .iter()
                .position(|p| p.dependency() == dependency)
                .ok_or_else(|| OrchestratorError::UnroutableOperation {
                    operation: operation.clone(),
                    dependency: dependency.clone(),
                })?;
            if routes.insert(operation.clone(), index).is_some() {
                return Err(OrchestratorError::DuplicateOperation(operation));
            }
        }

        tracing::info!(
            dependencies = pipelines.len(),
            nodes = graph.len(),
            operations = routes.len(),
            fallbacks = self.fallbacks.len(),
            deadline = ?self.deadline,
            "Orchestrator ready"
        );

        Ok(Orchestrator {
            pipelines,
            routes,
            cache: self.cache.unwrap_or_else(ResponseCache::in_memory),
            fallbacks: self.fallbacks,
            graph,
            deadline: self.deadline,
        })
    }
}
