//! Dependency health graph.
//!
//! # Responsibilities
//! - Hold one health record per dependency
//! - Propagate degradation along the declared dependency DAG
//! - Feed breaker transitions into the graph (`HealthReporter`)
//!
//! # Propagation
//! ```text
//! effective(n) = worst(own(n), effective(u) for every upstream u of n)
//!
//! on change of own(x):
//!     R = nodes reachable from x (x included)
//!     for n in topological order, n ∈ R: recompute effective(n)
//! ```
//!
//! # Design Decisions
//! - Nodes live in an arena; edges are integer indices resolved once at build
//! - Cycles are rejected at build time, so propagation always terminates
//! - Per-node state is atomic so reads never block
//! - Writers hold one propagation lock; an own-state change and its forward
//!   pass are applied as a unit, so a pass never overwrites a newer one

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::health::state::{HealthRecord, HealthState};
use crate::observability::metrics;
use crate::resilience::{BreakerObserver, CircuitState};

/// Index of a dependency in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Directed edge from an upstream dependency to one of its dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub upstream: NodeIndex,
    pub dependent: NodeIndex,
}

/// Errors raised while building the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown dependency: {0}")]
    UnknownDependency(String),

    #[error("dependency declared twice: {0}")]
    DuplicateDependency(String),

    #[error("dependency {0} cannot depend on itself")]
    SelfEdge(String),

    #[error("dependency cycle involving: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

#[derive(Debug)]
struct Node {
    id: String,
    failure_threshold: u32,
    own: AtomicU8,
    effective: AtomicU8,
    consecutive_failures: AtomicU32,
}

impl Node {
    fn new(id: String, failure_threshold: u32) -> Self {
        Self {
            id,
            failure_threshold,
            own: AtomicU8::new(HealthState::Healthy as u8),
            effective: AtomicU8::new(HealthState::Healthy as u8),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    fn own(&self) -> HealthState {
        HealthState::from(self.own.load(Ordering::Acquire))
    }

    fn effective(&self) -> HealthState {
        HealthState::from(self.effective.load(Ordering::Acquire))
    }
}

/// Collects nodes and edges, then validates them into a `HealthGraph`.
#[derive(Debug, Clone, Default)]
pub struct HealthGraphBuilder {
    nodes: Vec<(String, u32)>,
    edges: Vec<(String, String)>,
}

impl HealthGraphBuilder {
    /// Add a dependency guarded by a breaker with the given threshold.
    pub fn dependency(mut self, id: impl Into<String>, failure_threshold: u32) -> Self {
        self.nodes.push((id.into(), failure_threshold));
        self
    }

    /// Add a dependency without a breaker (its state is set externally).
    pub fn node(self, id: impl Into<String>) -> Self {
        self.dependency(id, 1)
    }

    /// Declare that `dependent` relies on `upstream`.
    pub fn edge(mut self, upstream: impl Into<String>, dependent: impl Into<String>) -> Self {
        self.edges.push((upstream.into(), dependent.into()));
        self
    }

    pub fn build(self) -> Result<HealthGraph, GraphError> {
        let mut index = HashMap::with_capacity(self.nodes.len());
        let mut nodes = Vec::with_capacity(self.nodes.len());

        for (id, threshold) in self.nodes {
            if index.contains_key(&id) {
                return Err(GraphError::DuplicateDependency(id));
            }
            index.insert(id.clone(), NodeIndex(nodes.len()));
            nodes.push(Node::new(id, threshold));
        }

        let resolve = |id: &str| index.get(id).copied().ok_or_else(|| GraphError::UnknownDependency(id.to_string()));

        let mut edges: Vec<DependencyEdge> = Vec::with_capacity(self.edges.len());
        for (upstream, dependent) in &self.edges {
            if upstream == dependent {
                return Err(GraphError::SelfEdge(upstream.clone()));
            }
            let edge = DependencyEdge {
                upstream: resolve(upstream)?,
                dependent: resolve(dependent)?,
            };
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }

        let mut downstream = vec![Vec::new(); nodes.len()];
        let mut upstream = vec![Vec::new(); nodes.len()];
        for edge in &edges {
            downstream[edge.upstream.0].push(edge.dependent);
            upstream[edge.dependent.0].push(edge.upstream);
        }

        let topo_order = topological_order(&downstream, &upstream).map_err(|stuck| {
            let mut names: Vec<String> = stuck.into_iter().map(|n| nodes[n.0].id.clone()).collect();
            names.sort();
            GraphError::Cycle(names)
        })?;

        Ok(HealthGraph {
            nodes,
            index,
            edges,
            downstream,
            upstream,
            topo_order,
            propagation: Mutex::new(()),
        })
    }
}

/// Kahn's algorithm. On a cycle, returns the nodes that never became free.
fn topological_order(downstream: &[Vec<NodeIndex>], upstream: &[Vec<NodeIndex>]) -> Result<Vec<NodeIndex>, Vec<NodeIndex>> {
    let mut in_degree: Vec<usize> = upstream.iter().map(Vec::len).collect();
    let mut ready: VecDeque<NodeIndex> = (0..in_degree.len())
        .filter(|&n| in_degree[n] == 0)
        .map(NodeIndex)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(node) = ready.pop_front() {
        order.push(node);
        for &next in &downstream[node.0] {
            in_degree[next.0] -= 1;
            if in_degree[next.0] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() == in_degree.len() {
        Ok(order)
    } else {
        Err((0..in_degree.len()).filter(|&n| in_degree[n] > 0).map(NodeIndex).collect())
    }
}

/// Health records for every dependency plus the DAG coupling them.
#[derive(Debug)]
pub struct HealthGraph {
    nodes: Vec<Node>,
    index: HashMap<String, NodeIndex>,
    edges: Vec<DependencyEdge>,
    downstream: Vec<Vec<NodeIndex>>,
    upstream: Vec<Vec<NodeIndex>>,
    topo_order: Vec<NodeIndex>,
    propagation: Mutex<()>,
}

impl HealthGraph {
    pub fn builder() -> HealthGraphBuilder {
        HealthGraphBuilder::default()
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn id(&self, node: NodeIndex) -> &str {
        &self.nodes[node.0].id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn upstreams(&self, node: NodeIndex) -> &[NodeIndex] {
        &self.upstream[node.0]
    }

    pub fn dependents(&self, node: NodeIndex) -> &[NodeIndex] {
        &self.downstream[node.0]
    }

    /// Effective state after propagation.
    pub fn state(&self, node: NodeIndex) -> HealthState {
        self.nodes[node.0].effective()
    }

    pub fn own_state(&self, node: NodeIndex) -> HealthState {
        self.nodes[node.0].own()
    }

    /// Effective state by dependency id.
    pub fn state_of(&self, id: &str) -> Option<HealthState> {
        self.index_of(id).map(|n| self.state(n))
    }

    /// Feed a breaker observation into the graph.
    pub fn record_breaker(&self, node: NodeIndex, state: CircuitState, consecutive_failures: u32) {
        let entry = &self.nodes[node.0];
        entry.consecutive_failures.store(consecutive_failures, Ordering::Release);
        let own = HealthState::from_breaker(state, consecutive_failures, entry.failure_threshold);
        self.set_own(node, own);
    }

    /// Override the own state of a dependency (probes, breaker-less nodes).
    pub fn set_state(&self, id: &str, state: HealthState) -> Result<(), GraphError> {
        let node = self
            .index_of(id)
            .ok_or_else(|| GraphError::UnknownDependency(id.to_string()))?;
        self.set_own(node, state);
        Ok(())
    }

    /// Upstream with the worst effective state, if any upstream exists.
    pub fn worst_upstream(&self, node: NodeIndex) -> Option<(NodeIndex, HealthState)> {
        self.upstream[node.0]
            .iter()
            .map(|&u| (u, self.state(u)))
            .max_by_key(|&(_, state)| state)
    }

    /// Upstream responsible for this node being worse than its own state.
    pub fn impaired_by(&self, node: NodeIndex) -> Option<NodeIndex> {
        let (upstream, state) = self.worst_upstream(node)?;
        (state > self.own_state(node) && state == self.state(node)).then_some(upstream)
    }

    pub fn record(&self, node: NodeIndex) -> HealthRecord {
        let entry = &self.nodes[node.0];
        HealthRecord {
            dependency: entry.id.clone(),
            consecutive_failures: entry.consecutive_failures.load(Ordering::Acquire),
            state: entry.effective(),
            own_state: entry.own(),
            impaired_by: self.impaired_by(node).map(|u| self.id(u).to_string()),
        }
    }

    /// Records for every dependency, keyed by id.
    pub fn snapshot(&self) -> BTreeMap<String, HealthRecord> {
        (0..self.nodes.len())
            .map(NodeIndex)
            .map(|n| (self.id(n).to_string(), self.record(n)))
            .collect()
    }

    fn set_own(&self, node: NodeIndex, own: HealthState) {
        let _writer = self.propagation.lock();
        let previous = HealthState::from(self.nodes[node.0].own.swap(own as u8, Ordering::AcqRel));
        if previous != own {
            tracing::debug!(
                dependency = %self.id(node),
                from = %previous,
                to = %own,
                "Dependency own health changed"
            );
            self.propagate(node);
        }
    }

    /// Single forward pass over everything reachable from `from`.
    fn propagate(&self, from: NodeIndex) {
        let mut reachable = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([from]);
        reachable[from.0] = true;
        while let Some(node) = queue.pop_front() {
            for &next in &self.downstream[node.0] {
                if !reachable[next.0] {
                    reachable[next.0] = true;
                    queue.push_back(next);
                }
            }
        }

        for &node in self.topo_order.iter().filter(|n| reachable[n.0]) {
            let entry = &self.nodes[node.0];
            let inherited = self.upstream[node.0]
                .iter()
                .map(|&u| self.state(u))
                .max()
                .unwrap_or(HealthState::Healthy);
            let effective = entry.own().worst(inherited);

            let previous = HealthState::from(entry.effective.swap(effective as u8, Ordering::AcqRel));
            if previous == effective {
                continue;
            }

            metrics::record_dependency_health(&entry.id, effective as u8);
            if effective > previous {
                tracing::warn!(
                    dependency = %entry.id,
                    from = %previous,
                    to = %effective,
                    inherited = effective > entry.own(),
                    "Dependency health worsened"
                );
            } else {
                tracing::info!(dependency = %entry.id, from = %previous, to = %effective, "Dependency health recovered");
            }
        }
    }
}

/// Breaker observer feeding one dependency's transitions into the graph.
pub struct HealthReporter {
    graph: Arc<HealthGraph>,
    node: NodeIndex,
}

impl HealthReporter {
    pub fn new(graph: Arc<HealthGraph>, node: NodeIndex) -> Self {
        Self { graph, node }
    }
}

impl BreakerObserver for HealthReporter {
    fn on_transition(&self, _from: CircuitState, to: CircuitState, consecutive_failures: u32) {
        self.graph.record_breaker(self.node, to, consecutive_failures);
    }

    fn on_outcome(&self, state: CircuitState, consecutive_failures: u32) {
        self.graph.record_breaker(self.node, state, consecutive_failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{CircuitBreaker, ResilienceError};
    use crate::client::ClassifiedError;
    use std::time::Duration;

    fn travel_graph() -> HealthGraph {
        HealthGraph::builder()
            .node("database")
            .dependency("ai_generation", 3)
            .dependency("flight_search", 3)
            .dependency("itinerary_store", 3)
            .edge("database", "itinerary_store")
            .edge("itinerary_store", "ai_generation")
            .build()
            .unwrap()
    }

    #[test]
    fn test_cascade_and_recovery() {
        let graph = travel_graph();
        let store = graph.index_of("itinerary_store").unwrap();
        let ai = graph.index_of("ai_generation").unwrap();
        let flights = graph.index_of("flight_search").unwrap();

        graph.set_state("database", HealthState::Unhealthy).unwrap();
        assert_eq!(graph.state(store), HealthState::Unhealthy);
        assert_eq!(graph.state(ai), HealthState::Unhealthy);
        assert_eq!(graph.own_state(ai), HealthState::Healthy);
        assert_eq!(graph.state(flights), HealthState::Healthy);

        let record = graph.record(ai);
        assert_eq!(record.impaired_by.as_deref(), Some("itinerary_store"));

        graph.set_state("database", HealthState::Healthy).unwrap();
        assert_eq!(graph.state(store), HealthState::Healthy);
        assert_eq!(graph.state(ai), HealthState::Healthy);
        assert_eq!(graph.record(ai).impaired_by, None);
    }

    #[test]
    fn test_degraded_upstream_does_not_mask_unhealthy() {
        let graph = travel_graph();
        let ai = graph.index_of("ai_generation").unwrap();

        graph.record_breaker(ai, CircuitState::Open, 3);
        graph.set_state("database", HealthState::Degraded).unwrap();
        assert_eq!(graph.state(ai), HealthState::Unhealthy);

        graph.record_breaker(ai, CircuitState::Closed, 0);
        assert_eq!(graph.state(ai), HealthState::Degraded);
    }

    #[test]
    fn test_dependent_heals_only_when_all_upstreams_recover() {
        let graph = HealthGraph::builder()
            .node("database")
            .node("cache_cluster")
            .dependency("ai_generation", 3)
            .edge("database", "ai_generation")
            .edge("cache_cluster", "ai_generation")
            .build()
            .unwrap();

        graph.set_state("database", HealthState::Unhealthy).unwrap();
        graph.set_state("cache_cluster", HealthState::Degraded).unwrap();
        assert_eq!(graph.state_of("ai_generation"), Some(HealthState::Unhealthy));

        graph.set_state("database", HealthState::Healthy).unwrap();
        assert_eq!(graph.state_of("ai_generation"), Some(HealthState::Degraded));

        graph.set_state("cache_cluster", HealthState::Healthy).unwrap();
        assert_eq!(graph.state_of("ai_generation"), Some(HealthState::Healthy));
    }

    #[test]
    fn test_build_rejects_bad_topologies() {
        let cycle = HealthGraph::builder()
            .node("a")
            .node("b")
            .node("c")
            .edge("a", "b")
            .edge("b", "c")
            .edge("c", "a")
            .build();
        assert_eq!(cycle.unwrap_err(), GraphError::Cycle(vec!["a".into(), "b".into(), "c".into()]));

        let unknown = HealthGraph::builder().node("a").edge("a", "ghost").build();
        assert_eq!(unknown.unwrap_err(), GraphError::UnknownDependency("ghost".into()));

        let duplicate = HealthGraph::builder().node("a").node("a").build();
        assert_eq!(duplicate.unwrap_err(), GraphError::DuplicateDependency("a".into()));

        let self_edge = HealthGraph::builder().node("a").edge("a", "a").build();
        assert_eq!(self_edge.unwrap_err(), GraphError::SelfEdge("a".into()));
    }

    #[test]
    fn test_duplicate_edges_are_collapsed() {
        let graph = HealthGraph::builder()
            .node("a")
            .node("b")
            .edge("a", "b")
            .edge("a", "b")
            .build()
            .unwrap();
        assert_eq!(graph.edges().len(), 1);
        let a = graph.index_of("a").unwrap();
        assert_eq!(graph.dependents(a).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_transitions_drive_the_graph() {
        let graph = Arc::new(
            HealthGraph::builder()
                .dependency("flight_search", 2)
                .node("trip_planner")
                .edge("flight_search", "trip_planner")
                .build()
                .unwrap(),
        );
        let flights = graph.index_of("flight_search").unwrap();
        let planner = graph.index_of("trip_planner").unwrap();
        let breaker = CircuitBreaker::new("flight_search", 2, Duration::from_secs(5))
            .with_observer(Arc::new(HealthReporter::new(graph.clone(), flights)));

        let fail = || async {
            Err::<(), _>(ResilienceError::service("flight_search", ClassifiedError::unavailable("503")))
        };

        let _ = breaker.call(fail).await;
        assert_eq!(graph.state(flights), HealthState::Degraded);
        assert_eq!(graph.record(flights).consecutive_failures, 1);

        let _ = breaker.call(fail).await;
        assert_eq!(graph.state(flights), HealthState::Unhealthy);
        assert_eq!(graph.state(planner), HealthState::Unhealthy);

        tokio::time::advance(Duration::from_secs(5)).await;
        breaker.call(|| async { Ok::<_, ResilienceError>(()) }).await.unwrap();
        assert_eq!(graph.state(flights), HealthState::Healthy);
        assert_eq!(graph.state(planner), HealthState::Healthy);
        assert_eq!(graph.record(flights).consecutive_failures, 0);
    }

    #[test]
    fn test_snapshot_lists_every_dependency() {
        let graph = travel_graph();
        let snapshot = graph.snapshot();
        assert_eq!(snapshot.len(), 4);
        assert!(snapshot.values().all(|r| r.state == HealthState::Healthy));
    }

    #[test]
    fn test_concurrent_updates_keep_dependent_at_worst_upstream() {
        let mut builder = HealthGraph::builder().node("database").node("hotel_search");
        builder = builder.edge("database", "hotel_search");
        for i in 0..300 {
            let id = format!("replica_{i}");
            builder = builder.node(&id).edge(&id, "hotel_search");
        }

        for _ in 0..200 {
            let graph = Arc::new(builder.clone().build().unwrap());
            let barrier = Arc::new(std::sync::Barrier::new(2));

            let handles: Vec<_> = [("database", HealthState::Unhealthy), ("replica_299", HealthState::Degraded)]
                .into_iter()
                .map(|(id, state)| {
                    let graph = graph.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        graph.set_state(id, state).unwrap();
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(graph.state_of("hotel_search"), Some(HealthState::Unhealthy));
        }
    }
}
