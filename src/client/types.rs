//! Error classification for external service calls.
//!
//! # Status Mapping
//! ```text
//! 2xx                      → success (payload must still parse)
//! 400, 422                 → Validation   (fatal, caller fault)
//! 404                      → NotFound     (fatal, caller fault)
//! 408, 500, other 5xx      → Transient    (retryable)
//! 429                      → RateLimit    (retryable, honors Retry-After)
//! 502, 503, 504            → Unavailable  (retryable)
//! other 4xx                → Permanent    (not retried, counts as failure)
//! unparseable 2xx payload  → Permanent
//! ```

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failure category reported by a service adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request rejected as malformed.
    Validation,
    /// Requested resource does not exist.
    NotFound,
    /// Upstream throttled the call.
    RateLimit,
    /// Network timeout, reset, or a server error likely to clear up.
    Transient,
    /// Dependency is down or refusing connections.
    Unavailable,
    /// Call completed but the result is unusable and will stay unusable.
    Permanent,
}

impl ErrorKind {
    /// Whether the retry executor may attempt the call again.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Transient | Self::Unavailable)
    }

    /// Whether the failure counts toward the circuit breaker threshold.
    pub fn counts_toward_breaker(self) -> bool {
        !self.is_caller_fault()
    }

    /// Caller mistakes bypass the breaker and the fallback registry.
    pub fn is_caller_fault(self) -> bool {
        matches!(self, Self::Validation | Self::NotFound)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::RateLimit => "rate_limit",
            Self::Transient => "transient",
            Self::Unavailable => "unavailable",
            Self::Permanent => "permanent",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an HTTP status code to an error kind. `None` means success.
pub fn classify_status(status: u16) -> Option<ErrorKind> {
    match status {
        200..=299 => None,
        400 | 422 => Some(ErrorKind::Validation),
        404 => Some(ErrorKind::NotFound),
        408 => Some(ErrorKind::Transient),
        429 => Some(ErrorKind::RateLimit),
        502..=504 => Some(ErrorKind::Unavailable),
        500..=599 => Some(ErrorKind::Transient),
        _ => Some(ErrorKind::Permanent),
    }
}

/// An adapter failure tagged with its kind.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} error: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    /// Server-requested delay before the next attempt (rate limits only).
    pub retry_after: Option<Duration>,
    /// Upstream status code, when the failure came from an HTTP response.
    pub status: Option<u16>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
            status: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::new(ErrorKind::RateLimit, message).with_retry_after(retry_after)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    /// Build an error from a non-success HTTP status.
    ///
    /// Returns `None` for 2xx statuses. `retry_after` is only kept for
    /// rate-limit responses.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Option<Self> {
        let kind = classify_status(status)?;
        let message = if body.trim().is_empty() {
            format!("upstream returned status {}", status)
        } else {
            format!("upstream returned status {}: {}", status, truncate(body.trim(), 256))
        };
        let retry_after = if kind == ErrorKind::RateLimit { retry_after } else { None };
        Some(Self::new(kind, message).with_status(status).with_retry_after(retry_after))
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
