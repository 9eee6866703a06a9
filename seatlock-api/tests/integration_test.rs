use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use seatlock_api::{app, AppState};
use seatlock_core::{HoldPolicy, MemoryStore, SeatLimits, SeatStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_app(policy: HoldPolicy) -> Router {
    let store: Arc<dyn SeatStore> = Arc::new(MemoryStore::new());
    app(AppState::new(store, policy, SeatLimits::default(), 10))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_event(app: &Router, total_seats: i64) -> String {
    let (status, body) = send(app, Method::POST, "/v1/events", Some(json!({ "totalSeats": total_seats }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["totalSeats"], total_seats);
    body["eventId"].as_str().unwrap().to_string()
}

async fn hold(app: &Router, event_id: &str, user_id: &str, seat_id: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/v1/events/{}/holds", event_id),
        Some(json!({ "userId": user_id, "seatId": seat_id })),
    )
    .await
}

fn claim(event_id: &str, seat_id: &str, user_id: &str) -> Option<Value> {
    Some(json!({ "eventId": event_id, "seatId": seat_id, "userId": user_id }))
}

#[tokio::test]
async fn test_create_event_validation() {
    let app = test_app(HoldPolicy::default());

    let (status, body) = send(&app, Method::POST, "/v1/events", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Total seats is required");

    for bad in [9, 1001] {
        let (status, body) = send(&app, Method::POST, "/v1/events", Some(json!({ "totalSeats": bad }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Total seats must be between 10 and 1000");
    }

    let event_id = create_event(&app, 10).await;
    let (status, body) = send(&app, Method::GET, &format!("/v1/events/{}", event_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalSeats"], 10);

    let (status, _) = send(&app, Method::GET, "/v1/events/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hold_reserve_flow() {
    let app = test_app(HoldPolicy::default());
    let event_id = create_event(&app, 20).await;

    let (status, body) = hold(&app, &event_id, "u1", "5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["seatId"], "5");
    assert_eq!(body["data"]["holdSeconds"], 60);

    let (status, body) = send(&app, Method::POST, "/v1/holds/remaining", claim(&event_id, "5", "u1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], 60);

    let (status, body) = hold(&app, &event_id, "u2", "5").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Seat is not available");

    let (status, body) = send(&app, Method::POST, "/v1/holds/reserve", claim(&event_id, "5", "u1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["seatId"], "5");

    let (status, body) = send(&app, Method::POST, "/v1/holds/reserve", claim(&event_id, "5", "u2")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Seat is not available: held by another user");

    let (status, _) = send(&app, Method::POST, "/v1/holds/reserve", claim(&event_id, "5", "u1")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&app, Method::POST, "/v1/holds/remaining", claim(&event_id, "5", "u1")).await;
    assert_eq!(body["data"], "PERSISTED");

    let (status, _) = send(&app, Method::POST, "/v1/holds/refresh", claim(&event_id, "5", "u1")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, Method::GET, "/v1/users/u1/reservations", None).await;
    assert_eq!(status, StatusCode::OK);
    let reserved = body["data"].as_array().unwrap();
    assert_eq!(reserved.len(), 1);
    assert_eq!(reserved[0]["id"], "5");
    assert_eq!(reserved[0]["eventId"], event_id.as_str());
    assert_eq!(reserved[0]["status"], "reserved");
}

#[tokio::test]
async fn test_quota_limits_holds_per_event() {
    let app = test_app(HoldPolicy::default());
    let event_id = create_event(&app, 20).await;

    for seat in 1..=5 {
        let (status, _) = hold(&app, &event_id, "u1", &seat.to_string()).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = hold(&app, &event_id, "u1", "6").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Maximum seats already held by the user for this event");

    // A taken seat is still a conflict for a user under the limit
    let (status, body) = hold(&app, &event_id, "u2", "1").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Seat is not available");

    let (status, body) = send(&app, Method::GET, &format!("/v1/events/{}/users/u1/holds", event_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let held: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(held, vec!["1", "2", "3", "4", "5"]);

    let (_, body) = send(&app, Method::GET, &format!("/v1/events/{}/seats/available", event_id), None).await;
    assert_eq!(body["availableSeats"].as_array().unwrap().len(), 15);
}

#[tokio::test(start_paused = true)]
async fn test_expired_hold_returns_seat_to_pool() {
    let policy = HoldPolicy { hold_seconds: 1, ..HoldPolicy::default() };
    let app = test_app(policy);
    let event_id = create_event(&app, 10).await;

    let (status, _) = hold(&app, &event_id, "u1", "3").await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::advance(Duration::from_millis(1100)).await;

    let (status, body) = send(&app, Method::POST, "/v1/holds/remaining", claim(&event_id, "3", "u1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());

    let (status, body) = hold(&app, &event_id, "u2", "3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["userId"], "u2");
}

#[tokio::test]
async fn test_hold_without_seat_picks_free_seat() {
    let app = test_app(HoldPolicy::default());
    let event_id = create_event(&app, 10).await;
    hold(&app, &event_id, "u1", "1").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/v1/events/{}/holds", event_id),
        Some(json!({ "userId": "u2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["seatId"], "2");
}

#[tokio::test]
async fn test_missing_fields_are_rejected() {
    let app = test_app(HoldPolicy::default());
    let event_id = create_event(&app, 10).await;

    let (status, body) = send(&app, Method::POST, &format!("/v1/events/{}/holds", event_id), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User ID is required");

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/holds/reserve",
        Some(json!({ "userId": "u1", "eventId": event_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Seat ID is required");

    let (status, _) = hold(&app, "no-such-event", "u1", "1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = hold(&app, &event_id, "u1", "11").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refresh_and_remaining_for_unknown_hold() {
    let app = test_app(HoldPolicy::default());
    let event_id = create_event(&app, 10).await;

    let (status, body) = send(&app, Method::POST, "/v1/holds/refresh", claim(&event_id, "2", "u1")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Hold cannot be refreshed: no active hold");

    let (_, body) = send(&app, Method::POST, "/v1/holds/remaining", claim(&event_id, "2", "u1")).await;
    assert!(body["data"].is_null());

    hold(&app, &event_id, "u1", "2").await;
    let (status, body) = send(&app, Method::POST, "/v1/holds/refresh", claim(&event_id, "2", "u1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["holdSeconds"], 60);
}

#[tokio::test]
async fn test_health() {
    let app = test_app(HoldPolicy::default());
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
