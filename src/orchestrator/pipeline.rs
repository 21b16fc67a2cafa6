//! Per-dependency call pipeline.

use std::sync::Arc;

use crate::client::ServiceClient;
use crate::health::{HealthGraph, HealthReporter, NodeIndex};
use crate::resilience::{
    AdapterStage, BreakerStage, Call, CircuitBreaker, DependencyDescriptor, RetryPolicy, RetryStage,
};

/// The protected path to one dependency.
///
/// Stage order is `RetryStage(BreakerStage(AdapterStage))`: every attempt,
/// retries included, asks the breaker first.
pub struct Pipeline {
    descriptor: DependencyDescriptor,
    breaker: Arc<CircuitBreaker>,
    call: Box<dyn Call>,
    node: NodeIndex,
}

impl Pipeline {
    pub fn new(
        descriptor: DependencyDescriptor,
        client: Arc<dyn ServiceClient>,
        graph: Arc<HealthGraph>,
        node: NodeIndex,
    ) -> Self {
        let breaker = Arc::new(
            CircuitBreaker::from_descriptor(&descriptor).with_observer(Arc::new(HealthReporter::new(graph, node))),
        );
        let call = RetryStage::new(
            descriptor.id.clone(),
            RetryPolicy::from_descriptor(&descriptor),
            BreakerStage::new(breaker.clone(), AdapterStage::new(client)),
        );

        Self {
            descriptor,
            breaker,
            call: Box::new(call),
            node,
        }
    }

    pub fn dependency(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn call(&self) -> &dyn Call {
        self.call.as_ref()
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("dependency", &self.descriptor.id)
            .field("breaker", &self.breaker)
            .finish()
    }
}
