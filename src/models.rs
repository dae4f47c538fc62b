//! Data models for the SlotPark backend.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A parking lot owned by one owner account.
///
/// `available_slots` is a best-effort counter bounded to `[0, total_slots]`,
/// mutated only through the capacity controller. It is a fast-reject cache,
/// not the source of truth for occupancy; the authoritative count is the
/// active-bookings query in `capacity`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Parking {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Price per hour, in whole rupees.
    pub price: i64,
    pub total_slots: i32,
    pub available_slots: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking lifecycle status.
///
/// CANCELLED, COMPLETED, EXPIRED and PAYMENT_FAILED are terminal. Time-based
/// advances (UPCOMING→ACTIVE, ACTIVE→EXPIRED, CHECKED_IN→OVERSTAYED) are
/// driven only by the reconciliation sweeps, never by request handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    PendingPayment,
    Upcoming,
    Active,
    CheckedIn,
    Overstayed,
    Completed,
    Cancelled,
    Expired,
    PaymentFailed,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Expired | Self::PaymentFailed
        )
    }

    /// The status transition table.
    ///
    /// UPCOMING→CHECKED_IN is admitted because the ±30-minute gate grace
    /// allows a vehicle in before the per-minute sweep has advanced the
    /// booking to ACTIVE.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::PendingPayment, Self::Upcoming)
                | (Self::PendingPayment, Self::Active)
                | (Self::PendingPayment, Self::Expired)
                | (Self::PendingPayment, Self::PaymentFailed)
                | (Self::Upcoming, Self::Active)
                | (Self::Upcoming, Self::CheckedIn)
                | (Self::Upcoming, Self::Cancelled)
                | (Self::Active, Self::CheckedIn)
                | (Self::Active, Self::Expired)
                | (Self::Active, Self::Cancelled)
                | (Self::CheckedIn, Self::Overstayed)
                | (Self::CheckedIn, Self::Completed)
                | (Self::Overstayed, Self::Completed)
        )
    }
}

/// Physical presence state of the vehicle, independent of booking status.
/// Transitions are strictly forward; once CHECKED_OUT no gate field changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gate_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    PendingEntry,
    CheckedIn,
    CheckedOut,
}

impl GateStatus {
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::PendingEntry, Self::CheckedIn) | (Self::CheckedIn, Self::CheckedOut)
        )
    }
}

/// How a vehicle was admitted or released at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_method", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryMethod {
    PlateOcr,
    Qr,
    Manual,
}

/// External payment state for a booking's order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Created,
    Paid,
    Failed,
}

/// A slot reservation for a time window, with its gate and payment state.
///
/// Bookings are never deleted; they only transition to a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub parking_id: Uuid,
    pub user_id: Uuid,
    /// Free text as entered; normalized only for comparison.
    pub vehicle_number: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    /// Civil IST calendar date of the window.
    pub booking_date: NaiveDate,
    /// Civil wall-clock "HH:MM" in IST.
    pub start_time: String,
    pub end_time: String,
    pub duration_hours: i32,
    /// Whole rupees.
    pub total_price: i64,
    pub status: BookingStatus,
    pub gate_status: GateStatus,

    pub payment_provider: Option<String>,
    pub payment_order_id: Option<String>,
    pub payment_payment_id: Option<String>,
    pub payment_signature: Option<String>,
    /// Gateway minor units (paise).
    pub payment_amount: Option<i64>,
    pub payment_currency: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_failed_at: Option<DateTime<Utc>>,
    pub payment_failure_reason: Option<String>,
    /// Only meaningful while status = PENDING_PAYMENT.
    pub hold_expires_at: Option<DateTime<Utc>>,

    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub entry_method: Option<EntryMethod>,
    pub exit_method: Option<EntryMethod>,

    // Last plate scan, audit only.
    pub plate_scan_raw: Option<String>,
    pub plate_scan_normalized: Option<String>,
    pub plate_scan_confidence: Option<f64>,
    pub plate_scanned_at: Option<DateTime<Utc>>,

    pub arrived_at_gate_at: Option<DateTime<Utc>>,
    pub queue_hold_until: Option<DateTime<Utc>>,
    pub queue_hold_revoked_at: Option<DateTime<Utc>>,
    pub queue_hold_revoke_reason: Option<String>,

    pub overstay_minutes: Option<i32>,
    pub overstay_fine: Option<i64>,

    pub cancelled_at: Option<DateTime<Utc>>,
    pub refund_percent: Option<i32>,
    pub refund_amount: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Grace period for entering after the window opens; an unentered booking
/// expires at `min(end, start + grace)`.
pub const NO_CHECKIN_GRACE_MINUTES: i64 = 20;

/// Grace period after the window end before overstay billing starts.
pub const EXIT_GRACE_MINUTES: i64 = 5;

/// The instant at which a still-unentered booking expires.
pub fn no_checkin_cutoff(start: DateTime<Utc>, end: DateTime<Utc>) -> DateTime<Utc> {
    (start + chrono::Duration::minutes(NO_CHECKIN_GRACE_MINUTES)).min(end)
}

/// API response wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [BookingStatus; 9] = [
        BookingStatus::PendingPayment,
        BookingStatus::Upcoming,
        BookingStatus::Active,
        BookingStatus::CheckedIn,
        BookingStatus::Overstayed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::Expired,
        BookingStatus::PaymentFailed,
    ];

    #[test]
    fn terminal_statuses_absorb() {
        for terminal in [
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::Expired,
            BookingStatus::PaymentFailed,
        ] {
            assert!(terminal.is_terminal());
            for target in ALL_STATUSES {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn completion_only_reachable_from_gate_states() {
        assert!(BookingStatus::CheckedIn.can_transition_to(BookingStatus::Completed));
        assert!(BookingStatus::Overstayed.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Active.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Upcoming.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::PendingPayment.can_transition_to(BookingStatus::Completed));
    }

    #[test]
    fn cancellation_only_from_upcoming_or_active() {
        assert!(BookingStatus::Upcoming.can_transition_to(BookingStatus::Cancelled));
        assert!(BookingStatus::Active.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::CheckedIn.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Overstayed.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::PendingPayment.can_transition_to(BookingStatus::Cancelled));
    }

    #[test]
    fn no_transition_skips_the_gate() {
        // A pending hold can only leave through promotion or failure.
        assert!(!BookingStatus::PendingPayment.can_transition_to(BookingStatus::CheckedIn));
        assert!(!BookingStatus::PendingPayment.can_transition_to(BookingStatus::Overstayed));
    }

    #[test]
    fn short_windows_expire_at_their_end() {
        use chrono::TimeZone;
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let end_short = Utc.with_ymd_and_hms(2025, 6, 1, 9, 10, 0).unwrap();
        let end_long = Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap();
        assert_eq!(no_checkin_cutoff(start, end_short), end_short);
        assert_eq!(
            no_checkin_cutoff(start, end_long),
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 20, 0).unwrap()
        );
        // A 30-minute window expires at start + 20 min, not at end.
        let end_30 = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        assert_eq!(
            no_checkin_cutoff(start, end_30),
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 20, 0).unwrap()
        );
    }

    #[test]
    fn gate_status_never_regresses() {
        assert!(GateStatus::PendingEntry.can_transition_to(GateStatus::CheckedIn));
        assert!(GateStatus::CheckedIn.can_transition_to(GateStatus::CheckedOut));
        assert!(!GateStatus::CheckedIn.can_transition_to(GateStatus::PendingEntry));
        assert!(!GateStatus::CheckedOut.can_transition_to(GateStatus::CheckedIn));
        assert!(!GateStatus::CheckedOut.can_transition_to(GateStatus::PendingEntry));
        assert!(!GateStatus::PendingEntry.can_transition_to(GateStatus::CheckedOut));
    }
}
