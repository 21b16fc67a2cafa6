//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use travel_resilience::client::{ClassifiedError, ServiceClient, ServiceRequest};
use travel_resilience::config::ListenerConfig;
use travel_resilience::resilience::DependencyDescriptor;
use travel_resilience::{HttpServer, Orchestrator, Shutdown};

type Script = Box<dyn Fn(u32) -> Result<Value, ClassifiedError> + Send + Sync>;

/// Programmable dependency. The script receives the 1-based call number.
pub struct MockDependency {
    id: &'static str,
    calls: AtomicU32,
    delay: Duration,
    script: Script,
}

impl MockDependency {
    pub fn new(
        id: &'static str,
        script: impl Fn(u32) -> Result<Value, ClassifiedError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
            script: Box::new(script),
        }
    }

    /// Always answers with `payload`.
    pub fn healthy(id: &'static str, payload: Value) -> Self {
        Self::new(id, move |_| Ok(payload.clone()))
    }

    /// Always fails with `error`.
    pub fn failing(id: &'static str, error: ClassifiedError) -> Self {
        Self::new(id, move |_| Err(error.clone()))
    }

    /// Fails the first `n` calls with a transient error, then answers.
    pub fn flaky(id: &'static str, n: u32) -> Self {
        Self::new(id, move |call| {
            if call <= n {
                Err(ClassifiedError::transient(format!("connection reset (call {call})")))
            } else {
                Ok(json!({ "ok": true, "call": call }))
            }
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceClient for MockDependency {
    fn dependency(&self) -> &str {
        self.id
    }

    async fn call(&self, _request: &ServiceRequest) -> Result<Value, ClassifiedError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(call)
    }
}

/// Descriptor with the knobs the scenarios care about; caching disabled.
pub fn descriptor(id: &str, failure_threshold: u32, cooldown: Duration, max_retries: u32) -> DependencyDescriptor {
    DependencyDescriptor {
        failure_threshold,
        cooldown,
        max_retries,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        cache_ttl: Duration::ZERO,
        ..DependencyDescriptor::new(id)
    }
}

/// Serve `orchestrator` on an ephemeral port.
pub async fn start_server(orchestrator: Arc<Orchestrator>) -> (SocketAddr, Arc<Shutdown>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Shutdown::new());

    let server = HttpServer::new(orchestrator, &ListenerConfig::default());
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}
