//! Errors surfaced by the resilience stages.

use std::time::Duration;

use thiserror::Error;

use crate::client::{ClassifiedError, ErrorKind};

/// Failure of a protected call, as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResilienceError {
    /// The dependency answered with a classified failure.
    #[error("{dependency}: {source}")]
    Service {
        dependency: String,
        #[source]
        source: ClassifiedError,
    },

    /// The circuit breaker rejected the call without reaching the dependency.
    #[error("circuit open for {dependency}, next trial in {retry_in:?}")]
    BreakerOpen { dependency: String, retry_in: Duration },

    /// The logical operation ran out of time.
    #[error("{operation} exceeded its deadline of {deadline:?}")]
    DeadlineExceeded { operation: String, deadline: Duration },

    /// The dependency was skipped because an upstream it relies on is unhealthy.
    #[error("{dependency} skipped: upstream {upstream} is unhealthy")]
    UpstreamUnavailable { dependency: String, upstream: String },

    /// The request was rejected before any dependency was called.
    #[error("invalid {operation} request: {reason}")]
    InvalidRequest { operation: String, reason: String },

    /// No pipeline is registered for the operation.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

impl ResilienceError {
    pub fn service(dependency: impl Into<String>, source: ClassifiedError) -> Self {
        Self::Service {
            dependency: dependency.into(),
            source,
        }
    }

    /// Classified kind, when the failure came from the dependency itself.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Service { source, .. } => Some(source.kind),
            _ => None,
        }
    }

    /// Only classified retryable failures are retried; breaker rejections never are.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_some_and(ErrorKind::is_retryable)
    }

    pub fn counts_toward_breaker(&self) -> bool {
        self.kind().is_some_and(ErrorKind::counts_toward_breaker)
    }

    /// Caller mistakes propagate directly and never reach a fallback.
    pub fn is_caller_fault(&self) -> bool {
        match self {
            Self::Service { source, .. } => source.kind.is_caller_fault(),
            Self::InvalidRequest { .. } | Self::UnknownOperation(_) => true,
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Service { source, .. } if source.kind == ErrorKind::RateLimit => source.retry_after,
            _ => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Service { source, .. } => source.kind.as_str(),
            Self::BreakerOpen { .. } => "breaker_open",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::UnknownOperation(_) => "unknown_operation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_policies() {
        let transient = ResilienceError::service("flight_search", ClassifiedError::transient("reset"));
        assert!(transient.is_retryable());
        assert!(transient.counts_toward_breaker());
        assert!(!transient.is_caller_fault());

        let validation = ResilienceError::service("flight_search", ClassifiedError::validation("bad date"));
        assert!(!validation.is_retryable());
        assert!(!validation.counts_toward_breaker());
        assert!(validation.is_caller_fault());

        let permanent = ResilienceError::service("flight_search", ClassifiedError::permanent("garbage"));
        assert!(!permanent.is_retryable());
        assert!(permanent.counts_toward_breaker());
    }

    #[test]
    fn test_breaker_open_is_terminal() {
        let err = ResilienceError::BreakerOpen {
            dependency: "ai_generation".into(),
            retry_in: Duration::from_secs(3),
        };
        assert!(!err.is_retryable());
        assert!(!err.counts_toward_breaker());
        assert!(!err.is_caller_fault());
        assert_eq!(err.label(), "breaker_open");
    }

    #[test]
    fn test_retry_after_exposed_for_rate_limits() {
        let err = ResilienceError::service(
            "hotel_search",
            ClassifiedError::rate_limited("slow down", Some(Duration::from_secs(4))),
        );
        assert_eq!(err.retry_after(), Some(Duration::from_secs(4)));
        assert_eq!(err.to_string(), "hotel_search: rate_limit error: slow down");
    }
}
