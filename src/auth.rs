//! Caller identity extraction.
//!
//! Authentication itself happens upstream; the trusted proxy injects the
//! verified caller as `x-user-id` / `x-user-role` headers. This module only
//! extracts them — authorization (role and ownership checks) lives in the
//! services.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::models::ApiResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Rider,
    Owner,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiResponse<()>>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let unauthorized = || {
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::err("Not authorized")),
            )
        };

        let id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(unauthorized)?;

        let role = match parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("RIDER")
        {
            "OWNER" => Role::Owner,
            "RIDER" => Role::Rider,
            _ => return Err(unauthorized()),
        };

        Ok(AuthUser { id, role })
    }
}
