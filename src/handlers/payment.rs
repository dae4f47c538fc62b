//! Payment handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::ServiceError;
use crate::models::{ApiResponse, Booking};
use crate::payment_service::{CreateOrderRequest, CreateOrderResponse, VerifyPaymentRequest};

#[derive(Debug, Serialize)]
pub struct GatewayKeyResponse {
    pub key_id: String,
}

pub async fn gateway_key(
    State(app_state): State<AppState>,
) -> Result<Json<ApiResponse<GatewayKeyResponse>>, ServiceError> {
    let key_id = app_state.payment_service.gateway_key_id()?;
    Ok(Json(ApiResponse::ok(GatewayKeyResponse { key_id })))
}

pub async fn create_order(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<ApiResponse<CreateOrderResponse>>, ServiceError> {
    let response = app_state.payment_service.create_order(user, request).await?;
    Ok(Json(ApiResponse::ok(response)))
}

pub async fn verify_payment(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<Booking>>, ServiceError> {
    let booking = app_state.payment_service.verify_payment(user, request).await?;
    Ok(Json(ApiResponse::ok(booking)))
}
