//! HTTP adapter for JSON services.
//!
//! # Responsibilities
//! - POST the request payload to the dependency endpoint
//! - Enforce a per-attempt timeout
//! - Classify transport errors, status codes and payloads

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;
use url::Url;

use crate::client::types::ClassifiedError;
use crate::client::{ServiceClient, ServiceRequest};

/// Header carrying the logical operation name.
pub const OPERATION_HEADER: &str = "x-operation";

/// JSON-over-HTTP client for one dependency.
#[derive(Clone)]
pub struct HttpServiceClient {
    dependency: String,
    endpoint: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpServiceClient {
    /// Create a client posting to `endpoint` with the given per-attempt timeout.
    pub fn new(
        dependency: impl Into<String>,
        endpoint: Url,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("travel-resilience/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            dependency: dependency.into(),
            endpoint,
            client,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn classify_transport(&self, error: reqwest::Error) -> ClassifiedError {
        if error.is_timeout() {
            ClassifiedError::transient(format!("request timed out after {:?}", self.timeout))
        } else if error.is_connect() {
            ClassifiedError::unavailable(format!("connection failed: {}", error))
        } else {
            ClassifiedError::transient(error.to_string())
        }
    }
}

#[async_trait]
impl ServiceClient for HttpServiceClient {
    fn dependency(&self) -> &str {
        &self.dependency
    }

    async fn call(&self, request: &ServiceRequest) -> Result<Value, ClassifiedError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(OPERATION_HEADER, &request.operation)
            .json(&request.payload)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = ClassifiedError::from_status(status, &body, retry_after)
                .unwrap_or_else(|| ClassifiedError::permanent(format!("unexpected status {}", status)));
            tracing::debug!(
                dependency = %self.dependency,
                status,
                kind = %error.kind,
                "Upstream returned an error status"
            );
            return Err(error);
        }

        let bytes = response.bytes().await.map_err(|e| self.classify_transport(e))?;

        serde_json::from_slice::<Value>(&bytes).map_err(|e| {
            ClassifiedError::permanent(format!("unparseable response payload: {}", e)).with_status(status)
        })
    }
}

impl std::fmt::Debug for HttpServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServiceClient")
            .field("dependency", &self.dependency)
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Parse a `Retry-After` header given in delta-seconds.
///
/// HTTP-date values are ignored; the computed backoff applies instead.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
