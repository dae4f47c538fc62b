//! Gate event processor — check-in/out by plate or booking id, overstay
//! billing, and geofenced arrive-at-gate queue holds.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::booking_service::{fetch_booking, fetch_parking};
use crate::capacity;
use crate::error::ServiceError;
use crate::geo;
use crate::ist;
use crate::models::{
    no_checkin_cutoff, Booking, BookingStatus, EntryMethod, GateStatus, Parking,
    EXIT_GRACE_MINUTES,
};
use crate::plate::{normalize_plate, plates_match};

/// Entry/exit tolerance around the booking window for gate scans.
const SCAN_GRACE_MINUTES: i64 = 30;

/// Overstay is billed in full blocks of this many minutes.
const OVERSTAY_BLOCK_MINUTES: i64 = 15;
/// Flat rate per started overstay block, in rupees.
const OVERSTAY_RATE_PER_BLOCK: i64 = 10;

/// Arrive-at-gate geofence radius.
const ARRIVAL_RADIUS_METERS: f64 = 50.0;
/// Arrival is only accepted in the last minutes before the expiry cutoff.
const ARRIVAL_WINDOW_MINUTES: i64 = 5;
/// How long an accepted arrival keeps the slot while the vehicle queues.
const QUEUE_HOLD_MINUTES: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct PlateGateRequest {
    pub parking_id: Uuid,
    pub plate_number: String,
    /// Raw OCR text, audit only.
    pub raw_text: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BookingGateRequest {
    pub booking_id: Uuid,
    pub parking_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ArrivalRequest {
    pub booking_id: Uuid,
    pub lat: f64,
    pub lng: f64,
}

/// Billable overstay for a checkout at `now`: whole minutes beyond
/// `end + exit grace`, billed per started block.
pub fn compute_overstay(now: DateTime<Utc>, end: DateTime<Utc>) -> (i32, i64) {
    let billable = now - (end + Duration::minutes(EXIT_GRACE_MINUTES));
    let seconds = billable.num_seconds();
    if seconds <= 0 {
        return (0, 0);
    }
    let minutes = (seconds + 59) / 60;
    let blocks = (minutes + OVERSTAY_BLOCK_MINUTES - 1) / OVERSTAY_BLOCK_MINUTES;
    (minutes as i32, blocks * OVERSTAY_RATE_PER_BLOCK)
}

pub struct GateService {
    pool: PgPool,
}

impl GateService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ===== Owner check-in / check-out by plate =====

    pub async fn check_in_by_plate(
        &self,
        owner: AuthUser,
        request: PlateGateRequest,
    ) -> Result<Booking, ServiceError> {
        let now = Utc::now();
        let parking = self.assert_owner_parking(owner, request.parking_id).await?;

        let plate_norm = normalize_plate(&request.plate_number);
        if plate_norm.is_empty() {
            return Err(ServiceError::Validation(
                "plateNumber is required".to_string(),
            ));
        }

        let booking = self
            .find_todays_booking_by_plate(parking.id, &request.plate_number, now)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(
                    "No active booking found for this plate today".to_string(),
                )
            })?;

        // Audit the scan on the matched booking even if the guards below
        // reject the operation.
        self.record_plate_scan(&booking, &request, &plate_norm, now)
            .await?;

        self.guard_scan_window(&booking, now)?;

        if booking.gate_status == GateStatus::CheckedIn {
            return Ok(booking);
        }

        self.admit(booking, EntryMethod::PlateOcr, now).await
    }

    pub async fn check_out_by_plate(
        &self,
        owner: AuthUser,
        request: PlateGateRequest,
    ) -> Result<Booking, ServiceError> {
        let now = Utc::now();
        let parking = self.assert_owner_parking(owner, request.parking_id).await?;

        let plate_norm = normalize_plate(&request.plate_number);
        if plate_norm.is_empty() {
            return Err(ServiceError::Validation(
                "plateNumber is required".to_string(),
            ));
        }

        let booking = self
            .find_todays_booking_by_plate(parking.id, &request.plate_number, now)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(
                    "No active booking found for this plate today".to_string(),
                )
            })?;

        self.record_plate_scan(&booking, &request, &plate_norm, now)
            .await?;

        self.release(booking, EntryMethod::PlateOcr, now).await
    }

    // ===== Owner check-in / check-out by booking id (QR fallback) =====

    pub async fn check_in_by_booking(
        &self,
        owner: AuthUser,
        request: BookingGateRequest,
    ) -> Result<Booking, ServiceError> {
        let now = Utc::now();
        let booking = self.fetch_owned_booking(owner, &request).await?;

        if booking.gate_status == GateStatus::CheckedOut {
            return Err(ServiceError::StateConflict(
                "Booking already checked out".to_string(),
            ));
        }
        if !matches!(
            booking.status,
            BookingStatus::Upcoming | BookingStatus::Active | BookingStatus::CheckedIn
        ) {
            return Err(ServiceError::StateConflict(
                "Booking is not active".to_string(),
            ));
        }

        self.guard_scan_window(&booking, now)?;

        if booking.gate_status == GateStatus::CheckedIn {
            return Ok(booking);
        }

        self.admit(booking, EntryMethod::Qr, now).await
    }

    pub async fn check_out_by_booking(
        &self,
        owner: AuthUser,
        request: BookingGateRequest,
    ) -> Result<Booking, ServiceError> {
        let now = Utc::now();
        let booking = self.fetch_owned_booking(owner, &request).await?;
        self.release(booking, EntryMethod::Qr, now).await
    }

    // ===== Rider arrive-at-gate queue hold =====

    /// Grants a 10-minute queue hold to a rider physically waiting at the
    /// gate just before their booking would expire unentered.
    pub async fn arrive_at_gate(
        &self,
        user: AuthUser,
        request: ArrivalRequest,
    ) -> Result<Booking, ServiceError> {
        let now = Utc::now();
        let booking = fetch_booking(&self.pool, request.booking_id).await?;
        if booking.user_id != user.id {
            return Err(ServiceError::Forbidden("Not allowed".to_string()));
        }

        if booking.gate_status != GateStatus::PendingEntry
            || !matches!(
                booking.status,
                BookingStatus::Upcoming | BookingStatus::Active
            )
        {
            return Err(ServiceError::StateConflict(
                "Booking is not awaiting entry".to_string(),
            ));
        }

        let (start, end) = booking_window(&booking)?;
        if now < start {
            return Err(ServiceError::StateConflict(
                "Gate arrival opens at the booking start time".to_string(),
            ));
        }

        let cutoff = no_checkin_cutoff(start, end);
        if now >= cutoff {
            return Err(ServiceError::StateConflict(
                "Booking entry window has closed".to_string(),
            ));
        }
        if now < cutoff - Duration::minutes(ARRIVAL_WINDOW_MINUTES) {
            return Err(ServiceError::StateConflict(
                "Too early to hold a gate queue spot".to_string(),
            ));
        }

        let (lat, lng) = booking_parking_coords(&self.pool, booking.parking_id).await?;
        let distance = geo::distance_meters(request.lat, request.lng, lat, lng);
        if distance > ARRIVAL_RADIUS_METERS {
            return Err(ServiceError::Validation(
                "Too far from the parking gate".to_string(),
            ));
        }

        let held = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET arrived_at_gate_at = $2, queue_hold_until = $3,
                queue_hold_revoked_at = NULL, queue_hold_revoke_reason = NULL,
                updated_at = $2
            WHERE id = $1
              AND status IN ('UPCOMING', 'ACTIVE')
              AND gate_status = 'PENDING_ENTRY'
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(now)
        .bind(now + Duration::minutes(QUEUE_HOLD_MINUTES))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ServiceError::StateConflict("Booking is not awaiting entry".to_string())
        })?;

        tracing::info!(booking_id = %held.id, "gate queue hold granted");
        Ok(held)
    }

    /// Revokes an active queue hold once the rider has left the geofence.
    pub async fn revoke_arrival(
        &self,
        user: AuthUser,
        request: ArrivalRequest,
    ) -> Result<Booking, ServiceError> {
        let now = Utc::now();
        let booking = fetch_booking(&self.pool, request.booking_id).await?;
        if booking.user_id != user.id {
            return Err(ServiceError::Forbidden("Not allowed".to_string()));
        }

        let hold_active = matches!(booking.queue_hold_until, Some(until) if until > now)
            && booking.queue_hold_revoked_at.is_none();
        if !hold_active {
            return Err(ServiceError::StateConflict(
                "No active gate hold to revoke".to_string(),
            ));
        }

        let (lat, lng) = booking_parking_coords(&self.pool, booking.parking_id).await?;
        let distance = geo::distance_meters(request.lat, request.lng, lat, lng);
        if distance <= ARRIVAL_RADIUS_METERS {
            return Err(ServiceError::Validation(
                "Still within the gate area".to_string(),
            ));
        }

        let revoked = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET queue_hold_until = NULL, queue_hold_revoked_at = $2,
                queue_hold_revoke_reason = 'LEFT_GEOFENCE', updated_at = $2
            WHERE id = $1 AND queue_hold_until > $2 AND queue_hold_revoked_at IS NULL
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ServiceError::StateConflict("No active gate hold to revoke".to_string())
        })?;

        tracing::info!(booking_id = %revoked.id, "gate queue hold revoked");
        Ok(revoked)
    }

    // ===== Shared steps =====

    async fn assert_owner_parking(
        &self,
        owner: AuthUser,
        parking_id: Uuid,
    ) -> Result<Parking, ServiceError> {
        if !owner.is_owner() {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }
        let parking = fetch_parking(&self.pool, parking_id).await?;
        if parking.owner_id != owner.id {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }
        Ok(parking)
    }

    async fn fetch_owned_booking(
        &self,
        owner: AuthUser,
        request: &BookingGateRequest,
    ) -> Result<Booking, ServiceError> {
        let booking = fetch_booking(&self.pool, request.booking_id).await?;
        let parking_id = request.parking_id.unwrap_or(booking.parking_id);
        let parking = self.assert_owner_parking(owner, parking_id).await?;
        if booking.parking_id != parking.id {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }
        Ok(booking)
    }

    /// Today's most recent plate match at this parking, across the statuses
    /// that can still legitimately stand at the gate.
    async fn find_todays_booking_by_plate(
        &self,
        parking_id: Uuid,
        plate: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>, ServiceError> {
        let today = ist::civil_today(now);
        let candidates = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE parking_id = $1 AND booking_date = $2
              AND status IN ('UPCOMING', 'ACTIVE', 'CHECKED_IN', 'OVERSTAYED')
              AND gate_status <> 'CHECKED_OUT'
            ORDER BY created_at DESC
            "#,
        )
        .bind(parking_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates
            .into_iter()
            .find(|b| plates_match(&b.vehicle_number, plate)))
    }

    async fn record_plate_scan(
        &self,
        booking: &Booking,
        request: &PlateGateRequest,
        normalized: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let raw = request
            .raw_text
            .as_deref()
            .map(|t| t.chars().take(200).collect::<String>());

        sqlx::query(
            r#"
            UPDATE bookings
            SET plate_scan_raw = $2, plate_scan_normalized = $3,
                plate_scan_confidence = $4, plate_scanned_at = $5, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(booking.id)
        .bind(raw)
        .bind(normalized)
        .bind(request.confidence)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Rejects scans outside the ±30-minute grace around the window.
    fn guard_scan_window(&self, booking: &Booking, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let (start, end) = booking_window(booking)?;
        let grace = Duration::minutes(SCAN_GRACE_MINUTES);
        if now < start - grace {
            return Err(ServiceError::StateConflict(
                "Too early for this booking".to_string(),
            ));
        }
        if now > end + grace {
            return Err(ServiceError::StateConflict(
                "Booking time has passed".to_string(),
            ));
        }
        Ok(())
    }

    /// Admits the vehicle: gate and status become CHECKED_IN together.
    async fn admit(
        &self,
        booking: Booking,
        method: EntryMethod,
        now: DateTime<Utc>,
    ) -> Result<Booking, ServiceError> {
        let admitted = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET gate_status = 'CHECKED_IN', status = 'CHECKED_IN',
                checked_in_at = $2, entry_method = $3, updated_at = $2
            WHERE id = $1 AND gate_status = 'PENDING_ENTRY'
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(now)
        .bind(method)
        .fetch_optional(&self.pool)
        .await?;

        match admitted {
            Some(admitted) => {
                tracing::info!(booking_id = %admitted.id, method = ?method, "vehicle checked in");
                Ok(admitted)
            }
            // Raced with another scan that already admitted the vehicle.
            None => fetch_booking(&self.pool, booking.id).await,
        }
    }

    /// Releases the vehicle: forces COMPLETED, bills overstay, frees the
    /// slot. The guard on CHECKED_IN makes a second checkout fail.
    async fn release(
        &self,
        booking: Booking,
        method: EntryMethod,
        now: DateTime<Utc>,
    ) -> Result<Booking, ServiceError> {
        match booking.gate_status {
            GateStatus::PendingEntry => {
                return Err(ServiceError::StateConflict(
                    "Booking is not checked in yet".to_string(),
                ))
            }
            GateStatus::CheckedOut => {
                return Err(ServiceError::StateConflict(
                    "Booking already checked out".to_string(),
                ))
            }
            GateStatus::CheckedIn => {}
        }

        let (_start, end) = booking_window(&booking)?;
        let (overstay_minutes, overstay_fine) = compute_overstay(now, end);

        let released = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET gate_status = 'CHECKED_OUT', status = 'COMPLETED',
                checked_out_at = $2, exit_method = $3,
                overstay_minutes = $4, overstay_fine = $5, updated_at = $2
            WHERE id = $1 AND gate_status = 'CHECKED_IN'
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(now)
        .bind(method)
        .bind(overstay_minutes)
        .bind(overstay_fine)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ServiceError::StateConflict("Booking already checked out".to_string())
        })?;

        capacity::release_slot(&self.pool, released.parking_id).await?;

        tracing::info!(
            booking_id = %released.id,
            overstay_minutes,
            overstay_fine,
            "vehicle checked out"
        );

        Ok(released)
    }
}

fn booking_window(booking: &Booking) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
    ist::window_instants(booking.booking_date, &booking.start_time, &booking.end_time)
        .ok_or_else(|| ServiceError::Validation("Booking has an invalid time window".to_string()))
}

async fn booking_parking_coords(pool: &PgPool, parking_id: Uuid) -> Result<(f64, f64), ServiceError> {
    let row: Option<(f64, f64)> = sqlx::query_as("SELECT lat, lng FROM parkings WHERE id = $1")
        .bind(parking_id)
        .fetch_optional(pool)
        .await?;
    row.ok_or_else(|| ServiceError::NotFound("Parking not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, 0).unwrap()
    }

    #[test]
    fn no_overstay_within_exit_grace() {
        let end = at(11, 0);
        assert_eq!(compute_overstay(at(10, 30), end), (0, 0));
        assert_eq!(compute_overstay(at(11, 0), end), (0, 0));
        assert_eq!(compute_overstay(at(11, 5), end), (0, 0));
    }

    #[test]
    fn one_block_for_a_twenty_minute_checkout() {
        // end 11:00, checkout 11:20 ⇒ 15 billable minutes ⇒ one block.
        assert_eq!(compute_overstay(at(11, 20), at(11, 0)), (15, 10));
    }

    #[test]
    fn blocks_are_billed_when_started() {
        let end = at(11, 0);
        assert_eq!(compute_overstay(at(11, 6), end), (1, 10));
        assert_eq!(compute_overstay(at(11, 21), end), (16, 20));
        assert_eq!(compute_overstay(at(11, 36), end), (31, 30));
        assert_eq!(compute_overstay(at(12, 5), end), (60, 40));
    }
}
