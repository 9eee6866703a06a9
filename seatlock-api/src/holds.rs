use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use seatlock_core::{HoldOutcome, HoldTime, RefreshOutcome, ReserveOutcome, Seat, SeatHold};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{required, AppError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: &'static str,
    pub data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldSeatRequest {
    pub user_id: Option<String>,
    /// Hold this seat; when absent the lowest free seat is picked.
    pub seat_id: Option<String>,
}

/// Body shared by reserve, refresh and remaining-time requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatClaimRequest {
    pub event_id: Option<String>,
    pub seat_id: Option<String>,
    pub user_id: Option<String>,
}

struct SeatClaim {
    event_id: String,
    seat_id: String,
    user_id: String,
}

impl TryFrom<SeatClaimRequest> for SeatClaim {
    type Error = AppError;

    fn try_from(req: SeatClaimRequest) -> Result<Self, AppError> {
        Ok(Self {
            user_id: required(req.user_id, "User ID")?,
            event_id: required(req.event_id, "Event ID")?,
            seat_id: required(req.seat_id, "Seat ID")?,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservedSeat {
    pub seat_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedHold {
    pub hold_seconds: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/events/{event_id}/holds", post(hold_seat))
        .route("/v1/events/{event_id}/users/{user_id}/holds", get(list_held_seats))
        .route("/v1/holds/reserve", post(reserve_seat))
        .route("/v1/holds/refresh", post(refresh_hold))
        .route("/v1/holds/remaining", post(remaining_hold_time))
        .route("/v1/users/{user_id}/reservations", get(list_reserved_seats))
}

/// POST /v1/events/:event_id/holds
async fn hold_seat(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(req): Json<HoldSeatRequest>,
) -> Result<Json<ApiResponse<SeatHold>>, AppError> {
    let user_id = required(req.user_id, "User ID")?;
    let event = state.events.require(&event_id).await?;

    let outcome = match req.seat_id.filter(|s| !s.is_empty()) {
        Some(seat_id) => state.engine.hold(&user_id, &event, &seat_id).await?,
        None => state.engine.hold_any(&user_id, &event).await?,
    };

    match outcome {
        HoldOutcome::Held(hold) => Ok(Json(ApiResponse { message: "Seat successfully held", data: hold })),
        HoldOutcome::QuotaExceeded => Err(AppError::ValidationError(
            "Maximum seats already held by the user for this event".into(),
        )),
        HoldOutcome::SeatUnavailable => Err(AppError::ConflictError("Seat is not available".into())),
    }
}

/// GET /v1/events/:event_id/users/:user_id/holds
async fn list_held_seats(
    State(state): State<AppState>,
    Path((event_id, user_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<Seat>>>, AppError> {
    let held = state.engine.list_held_by_user(&event_id, &user_id).await?;
    Ok(Json(ApiResponse { message: "Held seats by this user fetched successfully", data: held }))
}

/// POST /v1/holds/reserve
async fn reserve_seat(
    State(state): State<AppState>,
    Json(req): Json<SeatClaimRequest>,
) -> Result<Json<ApiResponse<ReservedSeat>>, AppError> {
    let SeatClaim { event_id, seat_id, user_id } = req.try_into()?;

    match state.engine.reserve(&event_id, &seat_id, &user_id).await? {
        ReserveOutcome::Reserved => {
            info!("Reservation confirmed for {} on {}/{}", user_id, event_id, seat_id);
            Ok(Json(ApiResponse { message: "Seat reserved successfully", data: ReservedSeat { seat_id } }))
        }
        ReserveOutcome::NoActiveHold => Err(AppError::ConflictError(
            "Seat is not available: no active hold for this user".into(),
        )),
        ReserveOutcome::AlreadyReserved => Err(AppError::ConflictError("Seat is already reserved".into())),
        ReserveOutcome::HeldByAnotherUser => Err(AppError::ConflictError(
            "Seat is not available: held by another user".into(),
        )),
    }
}

/// POST /v1/holds/refresh
async fn refresh_hold(
    State(state): State<AppState>,
    Json(req): Json<SeatClaimRequest>,
) -> Result<Json<ApiResponse<RefreshedHold>>, AppError> {
    let SeatClaim { event_id, seat_id, user_id } = req.try_into()?;

    match state.engine.refresh_hold(&event_id, &user_id, &seat_id).await? {
        RefreshOutcome::Refreshed { hold_seconds } => Ok(Json(ApiResponse {
            message: "Hold refreshed successfully",
            data: RefreshedHold { hold_seconds },
        })),
        RefreshOutcome::NoActiveHold => Err(AppError::ConflictError(
            "Hold cannot be refreshed: no active hold".into(),
        )),
        RefreshOutcome::AlreadyReserved => Err(AppError::ConflictError(
            "Hold cannot be refreshed: seat is reserved".into(),
        )),
    }
}

/// POST /v1/holds/remaining
async fn remaining_hold_time(
    State(state): State<AppState>,
    Json(req): Json<SeatClaimRequest>,
) -> Result<Json<ApiResponse<HoldTime>>, AppError> {
    let SeatClaim { event_id, seat_id, user_id } = req.try_into()?;
    let remaining = state.engine.hold_time_remaining(&event_id, &user_id, &seat_id).await?;
    Ok(Json(ApiResponse { message: "Remaining time fetched successfully", data: remaining }))
}

/// GET /v1/users/:user_id/reservations
async fn list_reserved_seats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Seat>>>, AppError> {
    let reserved = state.engine.list_reserved_by_user(&user_id).await?;
    Ok(Json(ApiResponse { message: "Reserved seats fetched successfully", data: reserved }))
}
