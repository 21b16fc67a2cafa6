//! The protected-call abstraction shared by every pipeline stage.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ServiceClient, ServiceRequest};
use crate::resilience::error::ResilienceError;

/// One stage of a protected call. Stages wrap each other and keep the same
/// signature, so retry, breaker and adapter compose in any order.
#[async_trait]
pub trait Call: Send + Sync {
    async fn call(&self, request: &ServiceRequest) -> Result<Value, ResilienceError>;
}

#[async_trait]
impl<C: Call + ?Sized> Call for Arc<C> {
    async fn call(&self, request: &ServiceRequest) -> Result<Value, ResilienceError> {
        (**self).call(request).await
    }
}

#[async_trait]
impl<C: Call + ?Sized> Call for Box<C> {
    async fn call(&self, request: &ServiceRequest) -> Result<Value, ResilienceError> {
        (**self).call(request).await
    }
}

/// Innermost stage: a single attempt against the service client.
pub struct AdapterStage {
    client: Arc<dyn ServiceClient>,
}

impl AdapterStage {
    pub fn new(client: Arc<dyn ServiceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Call for AdapterStage {
    async fn call(&self, request: &ServiceRequest) -> Result<Value, ResilienceError> {
        self.client
            .call(request)
            .await
            .map_err(|source| ResilienceError::service(self.client.dependency(), source))
    }
}
