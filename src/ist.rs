//! Civil time handling for booking windows.
//!
//! All booking-facing wall-clock values are civil date + hour:minute in a
//! fixed UTC+05:30 offset (no DST), independent of the server's own time
//! zone. Production servers often run in UTC; bookings are intended for IST.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Asia/Kolkata is UTC+05:30, with no daylight saving transitions.
pub const IST_OFFSET_SECONDS: i64 = 5 * 3600 + 30 * 60;

/// Converts civil IST date + time parts to the corresponding UTC instant.
pub fn civil_to_instant(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = NaiveDateTime::new(date, time);
    Utc.from_utc_datetime(&(naive - Duration::seconds(IST_OFFSET_SECONDS)))
}

/// Converts a UTC instant back to civil IST date + time parts.
pub fn instant_to_civil(instant: DateTime<Utc>) -> NaiveDateTime {
    instant.naive_utc() + Duration::seconds(IST_OFFSET_SECONDS)
}

/// The civil IST calendar date containing the given instant.
pub fn civil_today(now: DateTime<Utc>) -> NaiveDate {
    instant_to_civil(now).date()
}

/// Parses a `YYYY-MM-DD` civil date string.
pub fn parse_ymd(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Parses an `HH:MM` civil wall-clock string.
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Resolves a booking's stored civil window into absolute UTC instants.
///
/// Returns `None` when either time string is malformed.
pub fn window_instants(
    booking_date: NaiveDate,
    start_time: &str,
    end_time: &str,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = parse_hhmm(start_time)?;
    let end = parse_hhmm(end_time)?;
    Some((
        civil_to_instant(booking_date, start),
        civil_to_instant(booking_date, end),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_round_trips_exactly() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let instant = civil_to_instant(date, time);
        let civil = instant_to_civil(instant);
        assert_eq!(civil.date(), date);
        assert_eq!(civil.time(), time);
    }

    #[test]
    fn ist_midnight_is_previous_day_utc() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        let instant = civil_to_instant(date, midnight);
        // IST midnight is 18:30 the previous day in UTC.
        assert_eq!(instant.to_rfc3339(), "2025-03-13T18:30:00+00:00");
    }

    #[test]
    fn civil_today_crosses_the_utc_day_boundary() {
        // 19:00 UTC on the 13th is already 00:30 IST on the 14th.
        let now = Utc.with_ymd_and_hms(2025, 3, 13, 19, 0, 0).unwrap();
        assert_eq!(civil_today(now), NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    }

    #[test]
    fn parses_valid_dates_and_times() {
        assert!(parse_ymd("2025-01-31").is_some());
        assert!(parse_ymd("2025-13-01").is_none());
        assert!(parse_ymd("garbage").is_none());
        assert_eq!(
            parse_hhmm("09:05"),
            Some(NaiveTime::from_hms_opt(9, 5, 0).unwrap())
        );
        assert!(parse_hhmm("25:00").is_none());
        assert!(parse_hhmm("9am").is_none());
    }

    #[test]
    fn window_instants_resolves_both_ends() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let (start, end) = window_instants(date, "09:00", "11:00").unwrap();
        assert_eq!(end - start, Duration::hours(2));
        assert!(window_instants(date, "09:00", "bad").is_none());
    }
}
