//! Parking management handlers.

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::ServiceError;
use crate::models::{ApiResponse, Parking};
use crate::parking_service::{CreateParkingRequest, UpdateParkingRequest};

pub async fn create_parking(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateParkingRequest>,
) -> Result<Json<ApiResponse<Parking>>, ServiceError> {
    let parking = app_state.parking_service.create_parking(user, request).await?;
    Ok(Json(ApiResponse::ok(parking)))
}

pub async fn get_parking(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Parking>>, ServiceError> {
    let parking = app_state.parking_service.get_parking(id).await?;
    Ok(Json(ApiResponse::ok(parking)))
}

pub async fn owner_parkings(
    State(app_state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<Parking>>>, ServiceError> {
    let parkings = app_state.parking_service.owner_parkings(user).await?;
    Ok(Json(ApiResponse::ok(parkings)))
}

pub async fn update_parking(
    State(app_state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateParkingRequest>,
) -> Result<Json<ApiResponse<Parking>>, ServiceError> {
    let parking = app_state
        .parking_service
        .update_parking(user, id, request)
        .await?;
    Ok(Json(ApiResponse::ok(parking)))
}
