//! Slot capacity control for a parking lot.
//!
//! The cached `available_slots` counter and the authoritative active-bookings
//! query can briefly disagree under concurrency. Admission therefore runs two
//! layers: the authoritative count is checked against the bookable limit
//! first, then one conditional decrement refuses to cross the conflict
//! buffer. Even if several decrements interleave, none can succeed past the
//! buffer threshold.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ServiceError;

/// Reserved slot margin absorbing concurrent-acquisition races.
pub fn conflict_buffer(total_slots: i32) -> i32 {
    if total_slots <= 0 {
        return 0;
    }
    let buffer = ((total_slots as f64) * 0.10).ceil() as i32;
    buffer.max(2).min(total_slots)
}

/// Soft admission ceiling: `total_slots - conflict_buffer`.
pub fn bookable_limit(total_slots: i32) -> i32 {
    if total_slots <= 0 {
        return 0;
    }
    (total_slots - conflict_buffer(total_slots)).max(0)
}

/// Authoritative count of bookings currently occupying (or entitled to) a
/// slot: booked windows, vehicles inside, and unrevoked, unexpired queue
/// holds for vehicles physically waiting at the gate.
pub async fn active_occupancy(
    pool: &PgPool,
    parking_id: Uuid,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM bookings
        WHERE parking_id = $1
          AND gate_status <> 'CHECKED_OUT'
          AND status NOT IN ('CANCELLED', 'COMPLETED', 'EXPIRED', 'PENDING_PAYMENT', 'PAYMENT_FAILED')
          AND (
            status IN ('UPCOMING', 'ACTIVE')
            OR status IN ('CHECKED_IN', 'OVERSTAYED')
            OR (queue_hold_until > $2 AND queue_hold_revoked_at IS NULL)
          )
        "#,
    )
    .bind(parking_id)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Acquires one slot, or fails with `CapacityFull` and no other writes.
///
/// Layer 1 rejects when the authoritative occupancy has reached the bookable
/// limit. Layer 2 is a single conditional decrement that refuses to take the
/// counter past the conflict buffer.
pub async fn acquire_slot(
    pool: &PgPool,
    parking_id: Uuid,
    total_slots: i32,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let limit = bookable_limit(total_slots);
    let occupancy = active_occupancy(pool, parking_id, now).await?;
    if occupancy >= i64::from(limit) {
        return Err(ServiceError::CapacityFull);
    }

    let result = sqlx::query(
        r#"
        UPDATE parkings
        SET available_slots = available_slots - 1, updated_at = $3
        WHERE id = $1 AND available_slots > $2
        "#,
    )
    .bind(parking_id)
    .bind(conflict_buffer(total_slots))
    .bind(now)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::CapacityFull);
    }

    Ok(())
}

/// Releases one slot, clamped to `total_slots`.
///
/// Idempotence against double release is the caller's obligation: every call
/// site sits behind a status-guarded transition that can only match once.
pub async fn release_slot(pool: &PgPool, parking_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE parkings
        SET available_slots = LEAST(available_slots + 1, total_slots), updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(parking_id)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_has_a_floor_of_two() {
        assert_eq!(conflict_buffer(1), 1); // clamped to total
        assert_eq!(conflict_buffer(2), 2);
        assert_eq!(conflict_buffer(5), 2);
        assert_eq!(conflict_buffer(10), 2);
        assert_eq!(conflict_buffer(20), 2);
    }

    #[test]
    fn buffer_scales_at_ten_percent() {
        assert_eq!(conflict_buffer(21), 3);
        assert_eq!(conflict_buffer(50), 5);
        assert_eq!(conflict_buffer(95), 10);
        assert_eq!(conflict_buffer(100), 10);
    }

    #[test]
    fn twenty_slot_example() {
        assert_eq!(conflict_buffer(20), 2);
        assert_eq!(bookable_limit(20), 18);
    }

    #[test]
    fn degenerate_totals_yield_zero_limit() {
        assert_eq!(conflict_buffer(0), 0);
        assert_eq!(bookable_limit(0), 0);
        assert_eq!(conflict_buffer(-4), 0);
        assert_eq!(bookable_limit(-4), 0);
        assert_eq!(bookable_limit(1), 0);
        assert_eq!(bookable_limit(2), 0);
    }
}
