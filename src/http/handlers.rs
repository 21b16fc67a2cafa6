//! Request handlers for the travel API.
//!
//! Each handler validates its body, runs the operation through the
//! orchestrator and returns the outcome as JSON. Primary and fallback
//! results are both `200 OK`; the body carries the provenance.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::client::ErrorKind;
use crate::fallback::Outcome;
use crate::health::HealthState;
use crate::http::server::AppState;
use crate::orchestrator::travel::{FlightSearchParams, HotelSearchParams, ItineraryParams, TripPlan, TripRequest};
use crate::orchestrator::HealthReport;
use crate::resilience::ResilienceError;

/// Error body returned by every endpoint.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ResilienceError> for ApiError {
    fn from(error: ResilienceError) -> Self {
        let status = match &error {
            ResilienceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ResilienceError::UnknownOperation(_) => StatusCode::NOT_FOUND,
            ResilienceError::BreakerOpen { .. } | ResilienceError::UpstreamUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ResilienceError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            ResilienceError::Service { source, .. } => match source.kind {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::RateLimit | ErrorKind::Transient | ErrorKind::Permanent => StatusCode::BAD_GATEWAY,
            },
        };

        Self {
            status,
            code: error.label(),
            message: error.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            code: "invalid_request",
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(status = %self.status, code = self.code, message = %self.message, "Request failed");
        }
        let body = Json(json!({ "error": self.code, "message": self.message }));
        (self.status, body).into_response()
    }
}

fn body<T: DeserializeOwned>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(ApiError::from)
}

pub async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.orchestrator.get_health();
    let status = match report.status {
        HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(report))
}

pub async fn generate_itinerary(
    State(state): State<AppState>,
    payload: Result<Json<ItineraryParams>, JsonRejection>,
) -> Result<Json<Outcome>, ApiError> {
    let params = body(payload)?;
    Ok(Json(state.orchestrator.generate_itinerary(&params).await?))
}

pub async fn search_flights(
    State(state): State<AppState>,
    payload: Result<Json<FlightSearchParams>, JsonRejection>,
) -> Result<Json<Outcome>, ApiError> {
    let params = body(payload)?;
    Ok(Json(state.orchestrator.search_flights(&params).await?))
}

pub async fn search_hotels(
    State(state): State<AppState>,
    payload: Result<Json<HotelSearchParams>, JsonRejection>,
) -> Result<Json<Outcome>, ApiError> {
    let params = body(payload)?;
    Ok(Json(state.orchestrator.search_hotels(&params).await?))
}

pub async fn plan_trip(
    State(state): State<AppState>,
    payload: Result<Json<TripRequest>, JsonRejection>,
) -> Result<Json<TripPlan>, ApiError> {
    let request = body(payload)?;
    Ok(Json(state.orchestrator.plan_trip(&request).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClassifiedError;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ResilienceError::InvalidRequest {
                    operation: "search_flights".into(),
                    reason: "origin is required".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                ResilienceError::BreakerOpen {
                    dependency: "flight_search".into(),
                    retry_in: Duration::from_secs(3),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ResilienceError::DeadlineExceeded {
                    operation: "search_flights".into(),
                    deadline: Duration::from_secs(10),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ResilienceError::service("flight_search", ClassifiedError::permanent("garbage")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ResilienceError::service("flight_search", ClassifiedError::not_found("no route")),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }
}
