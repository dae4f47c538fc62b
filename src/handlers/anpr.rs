//! Plate scan proxy handler.
//!
//! Accepts raw image bytes and returns the provider's best
//! `{plate, confidence}` pair. Only owners scan plates.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::anpr::PlateScan;
use crate::error::ServiceError;
use crate::models::ApiResponse;

pub async fn scan_plate(
    State(app_state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<PlateScan>>, ServiceError> {
    if !user.is_owner() {
        return Err(ServiceError::Forbidden("Access denied".to_string()));
    }
    if body.is_empty() {
        return Err(ServiceError::Validation("No image provided".to_string()));
    }

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg");

    let scan = app_state.plate_client.scan(&body, mime_type).await?;
    Ok(Json(ApiResponse::ok(scan)))
}
