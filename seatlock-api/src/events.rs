use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use seatlock_core::{Event, Seat};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub total_seats: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventResponse {
    pub event_id: String,
    pub total_seats: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSeatsResponse {
    pub available_seats: Vec<Seat>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/events", post(create_event))
        .route("/v1/events/{event_id}", get(get_event))
        .route("/v1/events/{event_id}/seats/available", get(available_seats))
}

/// POST /v1/events
async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<CreateEventResponse>), AppError> {
    let total_seats = req
        .total_seats
        .ok_or_else(|| AppError::ValidationError("Total seats is required".into()))?;

    let event = state.events.create(total_seats).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateEventResponse { event_id: event.id, total_seats: event.total_seats }),
    ))
}

/// GET /v1/events/:event_id
async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(state.events.require(&event_id).await?))
}

/// GET /v1/events/:event_id/seats/available
async fn available_seats(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<AvailableSeatsResponse>, AppError> {
    let event = state.events.require(&event_id).await?;
    let available_seats = state.engine.index().find_available(&event).await?;
    Ok(Json(AvailableSeatsResponse { available_seats }))
}
