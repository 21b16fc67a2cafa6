//! Fallback registry.
//!
//! # Responsibilities
//! - Map operation names to fallback strategies
//! - Turn an exhausted failure into a `FallbackResult`
//!
//! # Design Decisions
//! - Strategies are synchronous; they must never reach the protected dependency
//! - The registry is filled at startup and read-only afterwards
//! - A missing strategy means the original error is returned unchanged

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::fallback::types::FallbackResult;
use crate::resilience::ResilienceError;

/// What a strategy sees when asked for a substitute.
#[derive(Debug, Clone, Copy)]
pub struct FallbackContext<'a> {
    pub operation: &'a str,
    pub dependency: &'a str,
    pub request: &'a Value,
    pub error: &'a ResilienceError,
}

/// Substitute payload and its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPayload {
    pub payload: Value,
    pub confidence: f64,
}

impl FallbackPayload {
    pub fn new(payload: Value, confidence: f64) -> Self {
        Self { payload, confidence }
    }
}

/// Produces a degraded result for one operation.
pub trait FallbackStrategy: Send + Sync {
    fn generate(&self, ctx: &FallbackContext<'_>) -> FallbackPayload;
}

impl<F> FallbackStrategy for F
where
    F: Fn(&FallbackContext<'_>) -> FallbackPayload + Send + Sync,
{
    fn generate(&self, ctx: &FallbackContext<'_>) -> FallbackPayload {
        self(ctx)
    }
}

/// Always returns the same payload.
#[derive(Debug, Clone)]
pub struct StaticFallback {
    payload: Value,
    confidence: f64,
}

impl StaticFallback {
    pub fn new(payload: Value, confidence: f64) -> Self {
        Self { payload, confidence }
    }
}

impl FallbackStrategy for StaticFallback {
    fn generate(&self, _ctx: &FallbackContext<'_>) -> FallbackPayload {
        FallbackPayload::new(self.payload.clone(), self.confidence)
    }
}

/// Operation name → strategy.
#[derive(Clone, Default)]
pub struct FallbackRegistry {
    strategies: HashMap<String, Arc<dyn FallbackStrategy>>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the strategy for `operation`.
    pub fn register(&mut self, operation: impl Into<String>, strategy: impl FallbackStrategy + 'static) -> &mut Self {
        let operation = operation.into();
        if self.strategies.insert(operation.clone(), Arc::new(strategy)).is_some() {
            tracing::warn!(operation = %operation, "Replacing registered fallback");
        }
        self
    }

    /// Register a closure as the strategy for `operation`.
    pub fn register_fn<F>(&mut self, operation: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&FallbackContext<'_>) -> FallbackPayload + Send + Sync + 'static,
    {
        self.register(operation, f)
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.strategies.contains_key(operation)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Produce a fallback result, or `None` when nothing is registered.
    pub fn resolve(&self, ctx: &FallbackContext<'_>) -> Option<FallbackResult> {
        let strategy = self.strategies.get(ctx.operation)?;
        let generated = strategy.generate(ctx);

        Some(FallbackResult::new(
            ctx.operation,
            generated.payload,
            generated.confidence,
            ctx.error.to_string(),
        ))
    }
}

impl std::fmt::Debug for FallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut operations: Vec<_> = self.strategies.keys().collect();
        operations.sort();
        f.debug_struct("FallbackRegistry").field("operations", &operations).finish()
    }
}
