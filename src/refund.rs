//! Cancellation refund tiers.

use chrono::{DateTime, Duration, Utc};

use crate::models::PaymentStatus;

/// A paid booking cancelled within this window of payment refunds in full.
pub const INSTANT_REFUND_WINDOW_MINUTES: i64 = 2;

/// Refund percentage for a cancellation at `now`.
///
/// 100% inside the instant-refund window after payment; before the window
/// starts, tiered by lead time (≥60 min → 75%, ≥30 min → 50%, else 0%);
/// nothing once the window has started.
pub fn refund_percent(
    now: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    payment_status: Option<PaymentStatus>,
    start: DateTime<Utc>,
) -> i32 {
    if payment_status == Some(PaymentStatus::Paid) {
        if let Some(paid_at) = paid_at {
            if now - paid_at <= Duration::minutes(INSTANT_REFUND_WINDOW_MINUTES) {
                return 100;
            }
        }
    }

    if now < start {
        let lead = start - now;
        if lead >= Duration::minutes(60) {
            return 75;
        }
        if lead >= Duration::minutes(30) {
            return 50;
        }
    }

    0
}

/// Rounds `total_price × percent`, clamped to `[0, total_price]`.
pub fn refund_amount(total_price: i64, percent: i32) -> i64 {
    let amount = ((total_price as f64) * (percent as f64) / 100.0).round() as i64;
    amount.clamp(0, total_price.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, 0).unwrap()
    }

    #[test]
    fn full_refund_right_after_paying() {
        let start = at(10, 0);
        let percent = refund_percent(at(8, 1), Some(at(8, 0)), Some(PaymentStatus::Paid), start);
        assert_eq!(percent, 100);
    }

    #[test]
    fn instant_window_closes_after_two_minutes() {
        let start = at(10, 0);
        let percent = refund_percent(at(8, 3), Some(at(8, 0)), Some(PaymentStatus::Paid), start);
        // Falls through to the lead-time tiers: ~2 h lead ⇒ 75%.
        assert_eq!(percent, 75);
    }

    #[test]
    fn tiers_are_non_increasing_as_start_approaches() {
        let start = at(10, 0);
        let paid = Some(at(6, 0));
        let status = Some(PaymentStatus::Paid);
        assert_eq!(refund_percent(at(8, 59), paid, status, start), 75);
        assert_eq!(refund_percent(at(9, 0), paid, status, start), 75);
        assert_eq!(refund_percent(at(9, 1), paid, status, start), 50);
        assert_eq!(refund_percent(at(9, 30), paid, status, start), 50);
        assert_eq!(refund_percent(at(9, 31), paid, status, start), 0);
        assert_eq!(refund_percent(at(10, 0), paid, status, start), 0);
        assert_eq!(refund_percent(at(10, 30), paid, status, start), 0);
    }

    #[test]
    fn unpaid_bookings_never_hit_the_instant_tier() {
        let start = at(10, 0);
        let percent = refund_percent(at(8, 1), Some(at(8, 0)), Some(PaymentStatus::Created), start);
        assert_eq!(percent, 75);
        let percent = refund_percent(at(9, 45), None, None, start);
        assert_eq!(percent, 0);
    }

    #[test]
    fn amounts_round_and_clamp() {
        assert_eq!(refund_amount(100, 75), 75);
        assert_eq!(refund_amount(99, 50), 50); // 49.5 rounds up
        assert_eq!(refund_amount(100, 0), 0);
        assert_eq!(refund_amount(100, 100), 100);
        assert_eq!(refund_amount(0, 100), 0);
    }
}
