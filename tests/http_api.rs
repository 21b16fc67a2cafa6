//! HTTP API tests against a live server on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use travel_resilience::client::ClassifiedError;
use travel_resilience::health::HealthState;
use travel_resilience::orchestrator::travel::{travel_fallbacks, AI_GENERATION, FLIGHT_SEARCH, HOTEL_SEARCH};
use travel_resilience::orchestrator::travel::{GENERATE_ITINERARY, SEARCH_FLIGHTS, SEARCH_HOTELS};
use travel_resilience::resilience::DependencyDescriptor;
use travel_resilience::Orchestrator;

mod common;
use common::{descriptor, start_server, MockDependency};

struct Mocks {
    ai: Arc<MockDependency>,
    flights: Arc<MockDependency>,
    hotels: Arc<MockDependency>,
}

fn build(mocks: &Mocks) -> Arc<Orchestrator> {
    let cooldown = Duration::from_secs(30);
    Arc::new(
        Orchestrator::builder()
            .dependency(
                DependencyDescriptor {
                    critical: true,
                    ..descriptor(AI_GENERATION, 3, cooldown, 1)
                },
                mocks.ai.clone(),
            )
            .dependency(
                DependencyDescriptor {
                    critical: true,
                    ..descriptor(FLIGHT_SEARCH, 3, cooldown, 1)
                },
                mocks.flights.clone(),
            )
            .dependency(descriptor(HOTEL_SEARCH, 3, cooldown, 1), mocks.hotels.clone())
            .node("database")
            .edge("database", HOTEL_SEARCH)
            .route(GENERATE_ITINERARY, AI_GENERATION)
            .route(SEARCH_FLIGHTS, FLIGHT_SEARCH)
            .route(SEARCH_HOTELS, HOTEL_SEARCH)
            .fallbacks(travel_fallbacks())
            .build()
            .unwrap(),
    )
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn itinerary_body() -> Value {
    json!({ "destination": "Porto", "days": 2, "interests": ["wine"] })
}

fn flights_body() -> Value {
    json!({ "origin": "LIS", "destination": "OPO", "departure_date": "2026-05-01" })
}

fn hotels_body() -> Value {
    json!({ "city": "Porto", "check_in": "2026-05-01", "check_out": "2026-05-03", "guests": 2 })
}

#[tokio::test]
async fn test_primary_and_fallback_responses() {
    let mocks = Mocks {
        ai: Arc::new(MockDependency::healthy(AI_GENERATION, json!({ "plan": ["Ribeira", "Douro"] }))),
        flights: Arc::new(MockDependency::failing(FLIGHT_SEARCH, ClassifiedError::unavailable("503"))),
        hotels: Arc::new(MockDependency::healthy(HOTEL_SEARCH, json!({ "hotels": [] }))),
    };
    let (addr, shutdown) = start_server(build(&mocks)).await;
    let http = client();

    let res = http
        .post(format!("http://{addr}/v1/itinerary"))
        .json(&itinerary_body())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["provenance"], "primary");
    assert_eq!(body["confidence"], 1.0);

    let res = http
        .post(format!("http://{addr}/v1/flights/search"))
        .json(&flights_body())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["provenance"], "fallback");
    assert!(body["confidence"].as_f64().unwrap() < 1.0);
    assert_eq!(body["payload"]["flights"], json!([]));
    assert_eq!(mocks.flights.calls(), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_before_dependencies() {
    let mocks = Mocks {
        ai: Arc::new(MockDependency::healthy(AI_GENERATION, json!({}))),
        flights: Arc::new(MockDependency::healthy(FLIGHT_SEARCH, json!({}))),
        hotels: Arc::new(MockDependency::healthy(HOTEL_SEARCH, json!({}))),
    };
    let (addr, shutdown) = start_server(build(&mocks)).await;
    let http = client();

    let res = http
        .post(format!("http://{addr}/v1/itinerary"))
        .json(&json!({ "destination": "Porto", "days": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");

    let res = http
        .post(format!("http://{addr}/v1/hotels/search"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    assert_eq!(mocks.ai.calls(), 0);
    assert_eq!(mocks.hotels.calls(), 0);
    shutdown.trigger();
}

#[tokio::test]
async fn test_trip_plan_and_health() {
    let mocks = Mocks {
        ai: Arc::new(MockDependency::healthy(AI_GENERATION, json!({ "plan": [] }))),
        flights: Arc::new(MockDependency::healthy(FLIGHT_SEARCH, json!({ "flights": ["TP1950"] }))),
        hotels: Arc::new(MockDependency::failing(HOTEL_SEARCH, ClassifiedError::permanent("garbled"))),
    };
    let orchestrator = build(&mocks);
    let (addr, shutdown) = start_server(orchestrator.clone()).await;
    let http = client();

    let res = http
        .post(format!("http://{addr}/v1/trips/plan"))
        .json(&json!({ "itinerary": itinerary_body(), "flights": flights_body(), "hotels": hotels_body() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let plan: Value = res.json().await.unwrap();
    assert_eq!(plan["usable"], true);
    assert_eq!(plan["degraded"], true);
    assert_eq!(plan["reports"].as_array().unwrap().len(), 3);

    let res = http.get(format!("http://{addr}/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let health: Value = res.json().await.unwrap();
    assert_eq!(health["dependencies"][HOTEL_SEARCH]["consecutive_failures"], 1);
    assert_eq!(health["dependencies"]["database"]["state"], "healthy");

    orchestrator.set_health("database", HealthState::Unhealthy).unwrap();
    let res = http.get(format!("http://{addr}/health")).send().await.unwrap();
    assert_eq!(res.status(), 503);
    let health: Value = res.json().await.unwrap();
    assert_eq!(health["dependencies"][HOTEL_SEARCH]["state"], "unhealthy");
    assert_eq!(health["dependencies"][HOTEL_SEARCH]["impaired_by"], "database");

    shutdown.trigger();
}
