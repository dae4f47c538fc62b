//! Parking management service layer.
//!
//! Owner-facing CRUD is kept minimal; slot counters themselves are only
//! moved by the capacity controller. Resizing a lot preserves the number of
//! currently booked slots.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::booking_service::fetch_parking;
use crate::error::ServiceError;
use crate::models::Parking;

const DEFAULT_TOTAL_SLOTS: i32 = 20;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateParkingRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(range(min = 0))]
    pub total_slots: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateParkingRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(range(min = 0))]
    pub total_slots: Option<i32>,
}

pub struct ParkingService {
    pool: PgPool,
}

impl ParkingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_parking(
        &self,
        owner: AuthUser,
        request: CreateParkingRequest,
    ) -> Result<Parking, ServiceError> {
        if !owner.is_owner() {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }
        request
            .validate()
            .map_err(|err| ServiceError::Validation(err.to_string()))?;

        let total_slots = request.total_slots.unwrap_or(DEFAULT_TOTAL_SLOTS);

        let parking = sqlx::query_as::<_, Parking>(
            r#"
            INSERT INTO parkings (id, owner_id, name, lat, lng, price, total_slots, available_slots, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner.id)
        .bind(request.name.trim())
        .bind(request.lat)
        .bind(request.lng)
        .bind(request.price)
        .bind(total_slots)
        .fetch_one(&self.pool)
        .await?;

        Ok(parking)
    }

    pub async fn get_parking(&self, id: Uuid) -> Result<Parking, ServiceError> {
        fetch_parking(&self.pool, id).await
    }

    pub async fn owner_parkings(&self, owner: AuthUser) -> Result<Vec<Parking>, ServiceError> {
        if !owner.is_owner() {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }
        let parkings = sqlx::query_as::<_, Parking>(
            "SELECT * FROM parkings WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(parkings)
    }

    /// Updates lot details. Resizing keeps `total_slots - available_slots`
    /// (the booked count) constant and refuses to shrink below it.
    pub async fn update_parking(
        &self,
        owner: AuthUser,
        id: Uuid,
        request: UpdateParkingRequest,
    ) -> Result<Parking, ServiceError> {
        if !owner.is_owner() {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }
        request
            .validate()
            .map_err(|err| ServiceError::Validation(err.to_string()))?;

        let parking = fetch_parking(&self.pool, id).await?;
        if parking.owner_id != owner.id {
            return Err(ServiceError::Forbidden("Not allowed".to_string()));
        }

        let name = match request.name {
            Some(ref name) => name.trim().to_string(),
            None => parking.name.clone(),
        };
        let lat = request.lat.unwrap_or(parking.lat);
        let lng = request.lng.unwrap_or(parking.lng);
        let price = request.price.unwrap_or(parking.price);

        let booked = parking.total_slots - parking.available_slots;
        let (total_slots, available_slots) = match request.total_slots {
            Some(new_total) => {
                if new_total < booked {
                    return Err(ServiceError::Validation(format!(
                        "totalSlots cannot be less than booked slots ({booked})"
                    )));
                }
                (new_total, new_total - booked)
            }
            None => (parking.total_slots, parking.available_slots),
        };

        let updated = sqlx::query_as::<_, Parking>(
            r#"
            UPDATE parkings
            SET name = $2, lat = $3, lng = $4, price = $5,
                total_slots = $6, available_slots = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(parking.id)
        .bind(name)
        .bind(lat)
        .bind(lng)
        .bind(price)
        .bind(total_slots)
        .bind(available_slots)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }
}
