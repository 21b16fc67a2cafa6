//! Result types returned by the orchestrator.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

/// Confidence attached to results from the primary path.
pub const PRIMARY_CONFIDENCE: f64 = 1.0;

/// Upper bound for fallback confidence; always below any primary result.
pub const MAX_FALLBACK_CONFIDENCE: f64 = 0.99;

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Fresh answer from the dependency.
    Primary,
    /// Earlier primary answer served from the response cache.
    Cache,
    /// Degraded substitute produced locally.
    Fallback,
}

impl Provenance {
    pub fn is_degraded(self) -> bool {
        self == Self::Fallback
    }
}

/// Answer produced by the dependency (fresh or cached).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrimaryResult {
    pub operation: String,
    pub payload: Value,
    provenance: Provenance,
    pub confidence: f64,
}

impl PrimaryResult {
    pub fn fresh(operation: impl Into<String>, payload: Value) -> Self {
        Self::with_provenance(operation, payload, Provenance::Primary)
    }

    pub fn cached(operation: impl Into<String>, payload: Value) -> Self {
        Self::with_provenance(operation, payload, Provenance::Cache)
    }

    fn with_provenance(operation: impl Into<String>, payload: Value, provenance: Provenance) -> Self {
        Self {
            operation: operation.into(),
            payload,
            provenance,
            confidence: PRIMARY_CONFIDENCE,
        }
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

/// Degraded substitute produced when the primary path is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackResult {
    pub operation: String,
    pub payload: Value,
    provenance: Provenance,
    pub confidence: f64,
    /// Unix seconds at generation time.
    pub generated_at: u64,
    /// Why the primary path was abandoned.
    pub reason: String,
}

impl FallbackResult {
    /// Create a fallback result; confidence is clamped to `[0, MAX_FALLBACK_CONFIDENCE]`.
    pub fn new(operation: impl Into<String>, payload: Value, confidence: f64, reason: impl Into<String>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, MAX_FALLBACK_CONFIDENCE)
        } else {
            0.0
        };

        Self {
            operation: operation.into(),
            payload,
            provenance: Provenance::Fallback,
            confidence,
            generated_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            reason: reason.into(),
        }
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

/// Outcome of one orchestrated operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Primary(PrimaryResult),
    Fallback(FallbackResult),
}

impl Outcome {
    pub fn provenance(&self) -> Provenance {
        match self {
            Self::Primary(r) => r.provenance(),
            Self::Fallback(r) => r.provenance(),
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            Self::Primary(r) => &r.payload,
            Self::Fallback(r) => &r.payload,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Primary(r) => r.confidence,
            Self::Fallback(r) => r.confidence,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn into_payload(self) -> Value {
        match self {
            Self::Primary(r) => r.payload,
            Self::Fallback(r) => r.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fallback_confidence_is_clamped() {
        let high = FallbackResult::new("search_flights", json!([]), 1.5, "breaker open");
        assert!(high.confidence < PRIMARY_CONFIDENCE);
        let negative = FallbackResult::new("search_flights", json!([]), -1.0, "breaker open");
        assert_eq!(negative.confidence, 0.0);
        let nan = FallbackResult::new("search_flights", json!([]), f64::NAN, "breaker open");
        assert_eq!(nan.confidence, 0.0);
    }

    #[test]
    fn test_provenance_is_serialized() {
        let outcome = Outcome::Fallback(FallbackResult::new("search_hotels", json!({}), 0.2, "timeout"));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["provenance"], "fallback");
        assert!(outcome.provenance().is_degraded());

        let cached = Outcome::Primary(PrimaryResult::cached("search_hotels", json!({})));
        assert_eq!(serde_json::to_value(&cached).unwrap()["provenance"], "cache");
        assert!(!cached.is_fallback());
    }
}
