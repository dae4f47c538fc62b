//! Booking service layer — direct creation, listing and cancellation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::capacity;
use crate::error::ServiceError;
use crate::ist;
use crate::models::{Booking, BookingStatus, Parking};
use crate::refund;

/// Minimum billable duration, in hours.
const MIN_DURATION_HOURS: i64 = 1;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub parking_id: Uuid,
    #[validate(length(min = 1, max = 32))]
    pub vehicle_number: String,
    /// `YYYY-MM-DD` civil IST date; defaults to today.
    pub booking_date: Option<String>,
    /// `HH:MM` civil wall-clock.
    pub start_time: String,
    pub end_time: String,
    pub customer_name: Option<String>,
    #[validate(email)]
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    /// Client-computed values; logged and ignored when they disagree.
    pub duration: Option<i32>,
    pub total_price: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CancelOutcome {
    pub refund_percent: i32,
    pub refund_amount: i64,
    pub booking: Booking,
}

/// A booking window resolved from civil parts into absolute instants.
#[derive(Debug, Clone)]
pub struct BookingWindow {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Validates and resolves a requested civil window. No side effects.
pub fn resolve_window(
    now: DateTime<Utc>,
    booking_date: Option<&str>,
    start_time: &str,
    end_time: &str,
) -> Result<BookingWindow, ServiceError> {
    let date = match booking_date {
        Some(raw) if !raw.trim().is_empty() => ist::parse_ymd(raw)
            .ok_or_else(|| ServiceError::Validation("Invalid booking date".to_string()))?,
        _ => ist::civil_today(now),
    };

    let start = ist::parse_hhmm(start_time)
        .ok_or_else(|| ServiceError::Validation("Invalid start/end time".to_string()))?;
    let end = ist::parse_hhmm(end_time)
        .ok_or_else(|| ServiceError::Validation("Invalid start/end time".to_string()))?;

    let start_instant = ist::civil_to_instant(date, start);
    let end_instant = ist::civil_to_instant(date, end);
    if end_instant <= start_instant {
        return Err(ServiceError::Validation(
            "End time must be after start time".to_string(),
        ));
    }

    Ok(BookingWindow {
        date,
        start_time: start.format("%H:%M").to_string(),
        end_time: end.format("%H:%M").to_string(),
        start: start_instant,
        end: end_instant,
    })
}

/// Billable whole hours for a window, rounded up.
pub fn billable_hours(window: &BookingWindow) -> i64 {
    let seconds = (window.end - window.start).num_seconds();
    ((seconds + 3599) / 3600).max(MIN_DURATION_HOURS)
}

pub struct BookingService {
    pool: PgPool,
}

impl BookingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a booking on the already-paid path.
    ///
    /// The initial status comes from the wall clock: UPCOMING before the
    /// window opens, ACTIVE inside it. A window that has already closed is
    /// rejected outright.
    pub async fn create_booking(
        &self,
        user: AuthUser,
        request: CreateBookingRequest,
    ) -> Result<Booking, ServiceError> {
        request
            .validate()
            .map_err(|err| ServiceError::Validation(err.to_string()))?;

        let now = Utc::now();
        let window = resolve_window(
            now,
            request.booking_date.as_deref(),
            &request.start_time,
            &request.end_time,
        )?;

        if now >= window.end {
            return Err(ServiceError::Validation(
                "Booking window has already passed".to_string(),
            ));
        }

        let parking = fetch_parking(&self.pool, request.parking_id).await?;

        let status = if now < window.start {
            BookingStatus::Upcoming
        } else {
            BookingStatus::Active
        };

        capacity::acquire_slot(&self.pool, parking.id, parking.total_slots, now).await?;

        let duration = billable_hours(&window) as i32;
        let total_price = i64::from(duration) * parking.price;

        // Non-fatal reconciliation mismatches: the server value wins.
        if let Some(client_duration) = request.duration {
            if client_duration != duration {
                tracing::debug!(client_duration, duration, "client duration ignored");
            }
        }
        if let Some(client_price) = request.total_price {
            if client_price != total_price {
                tracing::debug!(client_price, total_price, "client total price ignored");
            }
        }

        let inserted = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                id, parking_id, user_id, vehicle_number,
                customer_name, customer_email, customer_phone,
                booking_date, start_time, end_time, duration_hours, total_price,
                status, gate_status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'PENDING_ENTRY', $14, $14)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(parking.id)
        .bind(user.id)
        .bind(request.vehicle_number.trim())
        .bind(trimmed(request.customer_name))
        .bind(trimmed(request.customer_email).map(|e| e.to_lowercase()))
        .bind(trimmed(request.customer_phone))
        .bind(window.date)
        .bind(&window.start_time)
        .bind(&window.end_time)
        .bind(duration)
        .bind(total_price)
        .bind(status)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(booking) => {
                tracing::info!(booking_id = %booking.id, parking_id = %parking.id, "booking created");
                Ok(booking)
            }
            Err(err) => {
                // Compensate: the acquired slot must not be left stranded.
                if let Err(release_err) = capacity::release_slot(&self.pool, parking.id).await {
                    tracing::error!(
                        parking_id = %parking.id,
                        error = %release_err,
                        "failed to release slot after insert failure"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// The caller's bookings, most recent first.
    pub async fn my_bookings(&self, user: AuthUser) -> Result<Vec<Booking>, ServiceError> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    /// Bookings across the owner's parkings, optionally filtered to one lot.
    pub async fn owner_bookings(
        &self,
        owner: AuthUser,
        parking_id: Option<Uuid>,
    ) -> Result<Vec<Booking>, ServiceError> {
        if !owner.is_owner() {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        let bookings = match parking_id {
            Some(parking_id) => {
                let parking = fetch_parking(&self.pool, parking_id).await?;
                if parking.owner_id != owner.id {
                    return Err(ServiceError::Forbidden("Access denied".to_string()));
                }
                sqlx::query_as::<_, Booking>(
                    "SELECT * FROM bookings WHERE parking_id = $1 ORDER BY created_at DESC",
                )
                .bind(parking_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Booking>(
                    r#"
                    SELECT b.* FROM bookings b
                    JOIN parkings p ON p.id = b.parking_id
                    WHERE p.owner_id = $1
                    ORDER BY b.created_at DESC
                    "#,
                )
                .bind(owner.id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(bookings)
    }

    /// Cancels a booking and computes its refund.
    ///
    /// Not permitted once any gate-arrival artifact exists: a checked-in
    /// vehicle or an active queue hold blocks cancellation, which keeps a
    /// cancel/checkout race from crediting the slot twice.
    pub async fn cancel_booking(
        &self,
        user: AuthUser,
        booking_id: Uuid,
    ) -> Result<CancelOutcome, ServiceError> {
        let now = Utc::now();
        let booking = fetch_booking(&self.pool, booking_id).await?;

        if booking.user_id != user.id {
            return Err(ServiceError::Forbidden("Not allowed".to_string()));
        }

        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(ServiceError::StateConflict(
                "Booking cannot be cancelled".to_string(),
            ));
        }

        let (start, _end) =
            ist::window_instants(booking.booking_date, &booking.start_time, &booking.end_time)
                .ok_or_else(|| {
                    ServiceError::Validation("Booking has an invalid time window".to_string())
                })?;

        let percent =
            refund::refund_percent(now, booking.paid_at, booking.payment_status, start);
        let amount = refund::refund_amount(booking.total_price, percent);

        let cancelled = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = 'CANCELLED', cancelled_at = $2,
                refund_percent = $3, refund_amount = $4, updated_at = $2
            WHERE id = $1
              AND status IN ('UPCOMING', 'ACTIVE')
              AND gate_status = 'PENDING_ENTRY'
              AND (queue_hold_until IS NULL OR queue_hold_until <= $2 OR queue_hold_revoked_at IS NOT NULL)
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(now)
        .bind(percent)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        let Some(cancelled) = cancelled else {
            return Err(ServiceError::StateConflict(
                "Booking cannot be cancelled".to_string(),
            ));
        };

        capacity::release_slot(&self.pool, cancelled.parking_id).await?;
        tracing::info!(
            booking_id = %cancelled.id,
            refund_percent = percent,
            refund_amount = amount,
            "booking cancelled"
        );

        Ok(CancelOutcome {
            refund_percent: percent,
            refund_amount: amount,
            booking: cancelled,
        })
    }
}

pub(crate) async fn fetch_parking(pool: &PgPool, id: Uuid) -> Result<Parking, ServiceError> {
    sqlx::query_as::<_, Parking>("SELECT * FROM parkings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Parking not found".to_string()))
}

pub(crate) async fn fetch_booking(pool: &PgPool, id: Uuid) -> Result<Booking, ServiceError> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))
}

pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn rejects_inverted_windows() {
        let err = resolve_window(noon_utc(), Some("2025-06-01"), "11:00", "09:00").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = resolve_window(noon_utc(), Some("2025-06-01"), "09:00", "09:00").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn rejects_malformed_parts() {
        assert!(resolve_window(noon_utc(), Some("bad-date"), "09:00", "11:00").is_err());
        assert!(resolve_window(noon_utc(), Some("2025-06-01"), "9am", "11:00").is_err());
        assert!(resolve_window(noon_utc(), Some("2025-06-01"), "09:00", "27:00").is_err());
    }

    #[test]
    fn defaults_to_the_civil_ist_day() {
        // 21:00 UTC is already the next civil day in IST.
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 21, 0, 0).unwrap();
        let window = resolve_window(now, None, "09:00", "11:00").unwrap();
        assert_eq!(window.date, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
    }

    #[test]
    fn canonicalizes_time_strings() {
        let window = resolve_window(noon_utc(), Some("2025-06-01"), "9:5", "11:00").unwrap();
        assert_eq!(window.start_time, "09:05");
        assert_eq!(window.end_time, "11:00");
    }

    #[test]
    fn two_hour_window_bills_two_hours() {
        let window = resolve_window(noon_utc(), Some("2025-06-01"), "09:00", "11:00").unwrap();
        assert_eq!(billable_hours(&window), 2);
    }

    #[test]
    fn partial_hours_round_up() {
        let window = resolve_window(noon_utc(), Some("2025-06-01"), "09:00", "09:30").unwrap();
        assert_eq!(billable_hours(&window), 1);
        let window = resolve_window(noon_utc(), Some("2025-06-01"), "09:00", "10:01").unwrap();
        assert_eq!(billable_hours(&window), 2);
    }
}
