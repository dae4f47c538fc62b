//! Booking handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::booking_service::{CancelOutcome, CreateBookingRequest};
use crate::error::ServiceError;
use crate::models::{ApiResponse, Booking};

pub async fn create_booking(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<ApiResponse<Booking>>, ServiceError> {
    let booking = app_state.booking_service.create_booking(user, request).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

pub async fn my_bookings(
    State(app_state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<Booking>>>, ServiceError> {
    let bookings = app_state.booking_service.my_bookings(user).await?;
    Ok(Json(ApiResponse::ok(bookings)))
}

#[derive(Debug, Deserialize)]
pub struct OwnerBookingsQuery {
    pub parking_id: Option<Uuid>,
}

pub async fn owner_bookings(
    State(app_state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OwnerBookingsQuery>,
) -> Result<Json<ApiResponse<Vec<Booking>>>, ServiceError> {
    let bookings = app_state
        .booking_service
        .owner_bookings(user, query.parking_id)
        .await?;
    Ok(Json(ApiResponse::ok(bookings)))
}

pub async fn cancel_booking(
    State(app_state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CancelOutcome>>, ServiceError> {
    let outcome = app_state.booking_service.cancel_booking(user, id).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}
