//! Gate handlers: owner check-in/out and rider arrival holds.

use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::ServiceError;
use crate::gate_service::{ArrivalRequest, BookingGateRequest, PlateGateRequest};
use crate::models::{ApiResponse, Booking};

pub async fn check_in_by_plate(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(request): Json<PlateGateRequest>,
) -> Result<Json<ApiResponse<Booking>>, ServiceError> {
    let booking = app_state.gate_service.check_in_by_plate(user, request).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

pub async fn check_out_by_plate(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(request): Json<PlateGateRequest>,
) -> Result<Json<ApiResponse<Booking>>, ServiceError> {
    let booking = app_state.gate_service.check_out_by_plate(user, request).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

pub async fn check_in_by_booking(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(request): Json<BookingGateRequest>,
) -> Result<Json<ApiResponse<Booking>>, ServiceError> {
    let booking = app_state.gate_service.check_in_by_booking(user, request).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

pub async fn check_out_by_booking(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(request): Json<BookingGateRequest>,
) -> Result<Json<ApiResponse<Booking>>, ServiceError> {
    let booking = app_state.gate_service.check_out_by_booking(user, request).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

pub async fn arrive_at_gate(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ArrivalRequest>,
) -> Result<Json<ApiResponse<Booking>>, ServiceError> {
    let booking = app_state.gate_service.arrive_at_gate(user, request).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

pub async fn revoke_arrival(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ArrivalRequest>,
) -> Result<Json<ApiResponse<Booking>>, ServiceError> {
    let booking = app_state.gate_service.revoke_arrival(user, request).await?;
    Ok(Json(ApiResponse::ok(booking)))
}
