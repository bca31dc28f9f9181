//! Shared primitive types used across the whole router.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// A stable, unique identifier for a caller. String ordering on this id is
/// the tie-break for round-robin pool ordering, so ids must never be reused.
pub type CallerId = String;

/// A stable, unique identifier for a lead.
pub type LeadId = String;

/// A calendar day (UTC). Capacity counters are scoped per (caller, day).
pub type Day = NaiveDate;

/// The day "today" as seen by the router. All capacity accounting uses the
/// UTC calendar day, matching the audit log's UTC timestamps.
pub fn today_utc() -> Day {
    Utc::now().date_naive()
}

/// Format a day the way it is stored: `YYYY-MM-DD`.
pub fn fmt_day(day: Day) -> String {
    day.format("%Y-%m-%d").to_string()
}

pub fn parse_day(s: &str) -> Result<Day, chrono::ParseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
}

/// Format a timestamp the way it is stored: RFC 3339, fixed microsecond
/// precision, `Z` suffix. Fixed width keeps lexicographic TEXT ordering
/// equal to chronological ordering.
pub fn fmt_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_round_trips() {
        let t = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let s = fmt_timestamp(t);
        assert_eq!(parse_timestamp(&s).unwrap(), t);
    }

    #[test]
    fn timestamp_text_ordering_is_chronological() {
        let earlier = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(fmt_timestamp(earlier) < fmt_timestamp(later));
    }

    #[test]
    fn day_round_trips() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert_eq!(parse_day(&fmt_day(d)).unwrap(), d);
    }
}
