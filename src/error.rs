//! Service error taxonomy, mapped to HTTP status codes in one place.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ApiResponse;

/// Errors surfaced by the booking, payment and gate services.
///
/// Each variant is distinguished so the caller can decide whether a retry
/// makes sense. Everything is recovered at the request boundary and reported
/// with a specific message.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or missing fields, invalid time window. No side effects.
    #[error("{0}")]
    Validation(String),

    /// Unknown booking/parking id.
    #[error("{0}")]
    NotFound(String),

    /// Role or ownership mismatch.
    #[error("{0}")]
    Forbidden(String),

    /// Operation not valid in the record's current status/gate status.
    #[error("{0}")]
    StateConflict(String),

    /// Parking full at acquisition time.
    #[error("No slots available")]
    CapacityFull,

    /// Signature or order-id mismatch.
    #[error("{0}")]
    Security(String),

    /// Payment gateway or plate-recognition provider unavailable.
    #[error("{0}")]
    Upstream(String),

    /// Provider rejected our credentials.
    #[error("{0}")]
    UpstreamMisconfigured(String),

    /// Provider rate limit hit; caller may retry later.
    #[error("{0}")]
    UpstreamRateLimited(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Security(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::StateConflict(_) | Self::CapacityFull => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamMisconfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamRateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if let Self::Database(ref err) = self {
            tracing::error!(error = %err, "database error");
        }
        let status = self.status_code();
        (status, Json(ApiResponse::<()>::err(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_distinct_status_codes() {
        assert_eq!(
            ServiceError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::NotFound("Booking not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Forbidden("denied".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::StateConflict("already checked out".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(ServiceError::CapacityFull.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ServiceError::UpstreamRateLimited("slow down".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
