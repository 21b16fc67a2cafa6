//! Travel operations on top of the generic orchestrator.
//!
//! Typed parameters are validated before anything else runs, so a malformed
//! request never reaches the cache, a breaker or a fallback.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::fallback::{FallbackContext, FallbackPayload, FallbackRegistry, Outcome, StaticFallback};
use crate::orchestrator::Orchestrator;
use crate::resilience::ResilienceError;

pub const GENERATE_ITINERARY: &str = "generate_itinerary";
pub const SEARCH_FLIGHTS: &str = "search_flights";
pub const SEARCH_HOTELS: &str = "search_hotels";

pub const AI_GENERATION: &str = "ai_generation";
pub const FLIGHT_SEARCH: &str = "flight_search";
pub const HOTEL_SEARCH: &str = "hotel_search";

const MAX_TRIP_DAYS: u32 = 30;
const MAX_PARTY_SIZE: u32 = 9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryParams {
    pub destination: String,
    pub days: u32,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
}

impl ItineraryParams {
    pub fn validate(&self) -> Result<(), String> {
        require("destination", &self.destination)?;
        if self.days == 0 || self.days > MAX_TRIP_DAYS {
            return Err(format!("days must be between 1 and {MAX_TRIP_DAYS}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSearchParams {
    pub origin: String,
    pub destination: String,
    /// ISO date, `YYYY-MM-DD`.
    pub departure_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    #[serde(default = "default_party")]
    pub passengers: u32,
}

impl FlightSearchParams {
    pub fn validate(&self) -> Result<(), String> {
        require("origin", &self.origin)?;
        require("destination", &self.destination)?;
        if self.origin.trim().eq_ignore_ascii_case(self.destination.trim()) {
            return Err("origin and destination must differ".to_string());
        }
        let departure = parse_date("departure_date", &self.departure_date)?;
        if let Some(return_date) = &self.return_date {
            if parse_date("return_date", return_date)? < departure {
                return Err("return_date must not precede departure_date".to_string());
            }
        }
        party_size("passengers", self.passengers)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelSearchParams {
    pub city: String,
    /// ISO date, `YYYY-MM-DD`.
    pub check_in: String,
    pub check_out: String,
    #[serde(default = "default_party")]
    pub guests: u32,
}

impl HotelSearchParams {
    pub fn validate(&self) -> Result<(), String> {
        require("city", &self.city)?;
        let check_in = parse_date("check_in", &self.check_in)?;
        if parse_date("check_out", &self.check_out)? <= check_in {
            return Err("check_out must be after check_in".to_string());
        }
        party_size("guests", self.guests)
    }
}

fn default_party() -> u32 {
    1
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(())
    }
}

fn party_size(field: &str, n: u32) -> Result<(), String> {
    if n == 0 || n > MAX_PARTY_SIZE {
        Err(format!("{field} must be between 1 and {MAX_PARTY_SIZE}"))
    } else {
        Ok(())
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
fn parse_date(field: &str, value: &str) -> Result<NaiveDate, String> {
    let invalid = || format!("{field} must be a valid YYYY-MM-DD date");
    let value = value.trim();
    if value.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())
}

/// All legs of a trip, planned together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    pub itinerary: ItineraryParams,
    pub flights: FlightSearchParams,
    pub hotels: HotelSearchParams,
}

/// Result of one leg of a trip plan.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub operation: &'static str,
    pub critical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationReport {
    fn new(operation: &'static str, critical: bool, result: Result<Outcome, ResilienceError>) -> Self {
        match result {
            Ok(outcome) => Self {
                operation,
                critical,
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => Self {
                operation,
                critical,
                outcome: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Combined trip plan.
#[derive(Debug, Clone, Serialize)]
pub struct TripPlan {
    /// Every critical leg produced a result (primary or fallback).
    pub usable: bool,
    /// At least one leg was served by a fallback.
    pub degraded: bool,
    pub reports: Vec<OperationReport>,
}

impl Orchestrator {
    pub async fn generate_itinerary(&self, params: &ItineraryParams) -> Result<Outcome, ResilienceError> {
        self.execute_typed(GENERATE_ITINERARY, params, params.validate()).await
    }

    pub async fn search_flights(&self, params: &FlightSearchParams) -> Result<Outcome, ResilienceError> {
        self.execute_typed(SEARCH_FLIGHTS, params, params.validate()).await
    }

    pub async fn search_hotels(&self, params: &HotelSearchParams) -> Result<Outcome, ResilienceError> {
        self.execute_typed(SEARCH_HOTELS, params, params.validate()).await
    }

    /// Run every leg concurrently; each leg succeeds or degrades on its own.
    pub async fn plan_trip(&self, request: &TripRequest) -> TripPlan {
        let (itinerary, flights, hotels) = tokio::join!(
            self.generate_itinerary(&request.itinerary),
            self.search_flights(&request.flights),
            self.search_hotels(&request.hotels),
        );

        let reports: Vec<OperationReport> = [
            (GENERATE_ITINERARY, itinerary),
            (SEARCH_FLIGHTS, flights),
            (SEARCH_HOTELS, hotels),
        ]
        .into_iter()
        .map(|(operation, result)| {
            let critical = self.descriptor_for(operation).is_some_and(|d| d.critical);
            OperationReport::new(operation, critical, result)
        })
        .collect();

        let usable = reports.iter().filter(|r| r.critical).all(OperationReport::succeeded);
        let degraded = reports
            .iter()
            .any(|r| r.outcome.as_ref().is_some_and(Outcome::is_fallback));

        tracing::info!(usable, degraded, "Trip plan assembled");
        TripPlan {
            usable,
            degraded,
            reports,
        }
    }

    async fn execute_typed<P: Serialize>(
        &self,
        operation: &str,
        params: &P,
        validation: Result<(), String>,
    ) -> Result<Outcome, ResilienceError> {
        let invalid = |reason: String| ResilienceError::InvalidRequest {
            operation: operation.to_string(),
            reason,
        };

        validation.map_err(invalid)?;
        let payload = serde_json::to_value(params).map_err(|e| invalid(e.to_string()))?;
        self.execute(operation, payload).await
    }
}

/// Degraded answers for the travel operations.
pub fn travel_fallbacks() -> FallbackRegistry {
    let mut registry = FallbackRegistry::new();
    registry
        .register_fn(GENERATE_ITINERARY, skeleton_itinerary)
        .register(
            SEARCH_FLIGHTS,
            StaticFallback::new(
                json!({
                    "flights": [],
                    "notice": "Live flight search is temporarily unavailable. Please try again shortly."
                }),
                0.1,
            ),
        )
        .register(
            SEARCH_HOTELS,
            StaticFallback::new(
                json!({
                    "hotels": [],
                    "notice": "Live hotel search is temporarily unavailable. Please try again shortly."
                }),
                0.1,
            ),
        );
    registry
}

/// Day-by-day outline built from the request alone.
fn skeleton_itinerary(ctx: &FallbackContext<'_>) -> FallbackPayload {
    let destination = ctx
        .request
        .get("destination")
        .and_then(Value::as_str)
        .unwrap_or("your destination");
    let days = ctx
        .request
        .get("days")
        .and_then(Value::as_u64)
        .unwrap_or(1)
        .clamp(1, u64::from(MAX_TRIP_DAYS));

    let plan: Vec<Value> = (1..=days)
        .map(|day| {
            json!({
                "day": day,
                "title": format!("Day {day} in {destination}"),
                "activities": [format!("Explore {destination} at your own pace")],
            })
        })
        .collect();

    FallbackPayload::new(
        json!({
            "destination": destination,
            "days": plan,
            "notice": "A personalised itinerary could not be generated right now. Here is a basic outline.",
        }),
        0.3,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn itinerary() -> ItineraryParams {
        ItineraryParams {
            destination: "Kyoto".into(),
            days: 4,
            interests: vec!["temples".into()],
            budget: None,
        }
    }

    fn flights() -> FlightSearchParams {
        FlightSearchParams {
            origin: "LIS".into(),
            destination: "KIX".into(),
            departure_date: "2026-04-01".into(),
            return_date: Some("2026-04-05".into()),
            passengers: 2,
        }
    }

    #[test]
    fn test_itinerary_validation() {
        assert!(itinerary().validate().is_ok());
        assert!(ItineraryParams { days: 0, ..itinerary() }.validate().is_err());
        assert!(ItineraryParams { destination: "  ".into(), ..itinerary() }.validate().is_err());
    }

    #[test]
    fn test_flight_validation() {
        assert!(flights().validate().is_ok());
        let same = FlightSearchParams { destination: "lis".into(), ..flights() };
        assert_eq!(same.validate().unwrap_err(), "origin and destination must differ");
        let backwards = FlightSearchParams { return_date: Some("2026-03-30".into()), ..flights() };
        assert!(backwards.validate().is_err());
        let bad_date = FlightSearchParams { departure_date: "01/04/2026".into(), ..flights() };
        assert_eq!(bad_date.validate().unwrap_err(), "departure_date must be a valid YYYY-MM-DD date");
    }

    #[test]
    fn test_rejects_impossible_calendar_dates() {
        for date in ["2026-02-29", "2026-02-31", "2026-04-31", "2026-13-01"] {
            let params = FlightSearchParams { departure_date: date.into(), return_date: None, ..flights() };
            assert_eq!(params.validate().unwrap_err(), "departure_date must be a valid YYYY-MM-DD date");
        }
        let leap_day = FlightSearchParams { departure_date: "2028-02-29".into(), return_date: None, ..flights() };
        assert!(leap_day.validate().is_ok());
    }

    #[test]
    fn test_hotel_validation() {
        let stay = HotelSearchParams {
            city: "Kyoto".into(),
            check_in: "2026-04-01".into(),
            check_out: "2026-04-05".into(),
            guests: 2,
        };
        assert!(stay.validate().is_ok());
        let same_day = HotelSearchParams { check_out: "2026-04-01".into(), ..stay.clone() };
        assert!(same_day.validate().is_err());
        assert!(HotelSearchParams { guests: 12, ..stay }.validate().is_err());
    }

    #[test]
    fn test_skeleton_itinerary_uses_request() {
        let request = serde_json::to_value(itinerary()).unwrap();
        let error = ResilienceError::UnknownOperation("x".into());
        let payload = skeleton_itinerary(&FallbackContext {
            operation: GENERATE_ITINERARY,
            dependency: AI_GENERATION,
            request: &request,
            error: &error,
        });
        assert_eq!(payload.payload["days"].as_array().unwrap().len(), 4);
        assert_eq!(payload.payload["destination"], "Kyoto");
        assert!(payload.confidence < 1.0);
    }

    #[test]
    fn test_travel_fallbacks_cover_every_operation() {
        let registry = travel_fallbacks();
        for op in [GENERATE_ITINERARY, SEARCH_FLIGHTS, SEARCH_HOTELS] {
            assert!(registry.contains(op));
        }
    }
}
