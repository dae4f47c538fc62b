//! Periodic reconciliation sweeps.
//!
//! Two independent per-minute tasks keep time-based state consistent: one
//! advances booking lifecycle status and releases capacity for expired
//! no-check-in bookings, the other fails PENDING_PAYMENT holds past their
//! expiry. Every step is a status-guarded conditional update, so a booking
//! already moved by a concurrent request is skipped rather than
//! double-processed, and a duplicate scheduler instance is harmless.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::capacity;
use crate::ist;
use crate::models::{no_checkin_cutoff, Booking, BookingStatus, GateStatus, EXIT_GRACE_MINUTES};

/// Starts both sweeps on a once-per-minute schedule.
pub async fn start(pool: PgPool) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let lifecycle_pool = pool.clone();
    scheduler
        .add(Job::new_async("0 * * * * *", move |_id, _lock| {
            let pool = lifecycle_pool.clone();
            Box::pin(async move {
                if let Err(err) = reconcile_booking_lifecycle(&pool, Utc::now()).await {
                    error!(error = %err, "booking lifecycle sweep failed");
                }
            })
        })?)
        .await?;

    let holds_pool = pool;
    scheduler
        .add(Job::new_async("0 * * * * *", move |_id, _lock| {
            let pool = holds_pool.clone();
            Box::pin(async move {
                if let Err(err) = sweep_expired_holds(&pool, Utc::now()).await {
                    error!(error = %err, "payment hold sweep failed");
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    info!("reconciliation sweeps scheduled");
    Ok(scheduler)
}

/// Advances time-based booking status.
///
/// UPCOMING→ACTIVE at the start instant; ACTIVE→EXPIRED once the
/// no-check-in cutoff passes with the gate still untouched (an active queue
/// hold postpones this — the vehicle is physically waiting); and
/// CHECKED_IN→OVERSTAYED once the exit grace runs out. Failures are caught
/// per booking so one bad record cannot halt the sweep.
pub async fn reconcile_booking_lifecycle(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let candidates = sqlx::query_as::<_, Booking>(
        r#"
        SELECT * FROM bookings
        WHERE status IN ('UPCOMING', 'ACTIVE', 'CHECKED_IN')
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut advanced = 0u64;
    let mut expired = 0u64;

    for booking in candidates {
        match reconcile_one(pool, &booking, now).await {
            Ok(Transition::Advanced) => advanced += 1,
            Ok(Transition::Expired) => expired += 1,
            Ok(Transition::None) => {}
            Err(err) => {
                warn!(booking_id = %booking.id, error = %err, "sweep step failed; will retry next tick");
            }
        }
    }

    if advanced > 0 || expired > 0 {
        info!(advanced, expired, "booking lifecycle sweep complete");
    }

    Ok(())
}

enum Transition {
    None,
    Advanced,
    Expired,
}

async fn reconcile_one(
    pool: &PgPool,
    booking: &Booking,
    now: DateTime<Utc>,
) -> Result<Transition, sqlx::Error> {
    let Some((start, end)) =
        ist::window_instants(booking.booking_date, &booking.start_time, &booking.end_time)
    else {
        warn!(booking_id = %booking.id, "booking has an unparseable window; skipping");
        return Ok(Transition::None);
    };

    match booking.status {
        BookingStatus::Upcoming if now >= start => {
            let result = sqlx::query(
                "UPDATE bookings SET status = 'ACTIVE', updated_at = $2 WHERE id = $1 AND status = 'UPCOMING'",
            )
            .bind(booking.id)
            .bind(now)
            .execute(pool)
            .await?;
            Ok(if result.rows_affected() > 0 {
                Transition::Advanced
            } else {
                Transition::None
            })
        }
        BookingStatus::Active
            if booking.gate_status == GateStatus::PendingEntry
                && now >= no_checkin_cutoff(start, end) =>
        {
            expire_unentered(pool, booking.id, booking.parking_id, now).await
        }
        BookingStatus::CheckedIn
            if booking.gate_status == GateStatus::CheckedIn
                && now > end + chrono::Duration::minutes(EXIT_GRACE_MINUTES) =>
        {
            let result = sqlx::query(
                r#"
                UPDATE bookings SET status = 'OVERSTAYED', updated_at = $2
                WHERE id = $1 AND status = 'CHECKED_IN' AND gate_status = 'CHECKED_IN'
                "#,
            )
            .bind(booking.id)
            .bind(now)
            .execute(pool)
            .await?;
            Ok(if result.rows_affected() > 0 {
                Transition::Advanced
            } else {
                Transition::None
            })
        }
        _ => Ok(Transition::None),
    }
}

/// Expires an ACTIVE booking that never entered, unless an unrevoked,
/// unexpired queue hold still entitles it to the slot. The gate guard means
/// a check-in racing this sweep always wins.
async fn expire_unentered(
    pool: &PgPool,
    booking_id: Uuid,
    parking_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Transition, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET status = 'EXPIRED', updated_at = $2
        WHERE id = $1 AND status = 'ACTIVE' AND gate_status = 'PENDING_ENTRY'
          AND (queue_hold_until IS NULL OR queue_hold_until <= $2 OR queue_hold_revoked_at IS NOT NULL)
        "#,
    )
    .bind(booking_id)
    .bind(now)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(Transition::None);
    }

    capacity::release_slot(pool, parking_id).await?;
    info!(booking_id = %booking_id, "unentered booking expired");
    Ok(Transition::Expired)
}

/// Fails PENDING_PAYMENT holds past `hold_expires_at` and releases their
/// slots.
pub async fn sweep_expired_holds(pool: &PgPool, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
    let expired: Vec<(Uuid, Uuid)> = sqlx::query_as(
        r#"
        SELECT id, parking_id FROM bookings
        WHERE status = 'PENDING_PAYMENT' AND hold_expires_at <= $1
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    let mut released = 0u64;

    for (booking_id, parking_id) in expired {
        // Guarded on status: a verify-payment call racing this sweep has
        // already promoted the booking and must not lose its slot.
        let step = async {
            let result = sqlx::query(
                r#"
                UPDATE bookings
                SET status = 'EXPIRED', payment_status = 'FAILED',
                    payment_failed_at = $2, payment_failure_reason = 'PAYMENT_WINDOW_EXPIRED',
                    hold_expires_at = NULL, updated_at = $2
                WHERE id = $1 AND status = 'PENDING_PAYMENT'
                "#,
            )
            .bind(booking_id)
            .bind(now)
            .execute(pool)
            .await?;

            if result.rows_affected() > 0 {
                capacity::release_slot(pool, parking_id).await?;
                return Ok::<bool, sqlx::Error>(true);
            }
            Ok(false)
        };

        match step.await {
            Ok(true) => released += 1,
            Ok(false) => {}
            Err(err) => {
                warn!(booking_id = %booking_id, error = %err, "hold sweep step failed; will retry next tick");
            }
        }
    }

    if released > 0 {
        info!(released, "expired payment holds released");
    }

    Ok(())
}
