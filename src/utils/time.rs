// src/utils/time.rs

//! Timestamp parsing helpers for provider data.
//!
//! Provider validity fields arrive in several formats depending on the
//! upstream export path, so parsing tries each known format in turn.

use chrono::{DateTime, Duration, NaiveDateTime, Utc, Weekday};

/// Naive formats seen in provider exports, tried after RFC 3339.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parse a provider timestamp, trying RFC 3339 first and then the known
/// naive formats (interpreted as UTC).
pub fn parse_provider_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Resolve a bulletin validity window from optional raw fields.
///
/// Unparsable or missing bounds fall back to `now` / `now + 1 day`.
pub fn validity_window(
    valid_from: Option<&str>,
    valid_until: Option<&str>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = valid_from
        .and_then(parse_provider_timestamp)
        .unwrap_or(now);
    let until = valid_until
        .and_then(parse_provider_timestamp)
        .unwrap_or(now + Duration::days(1));
    (from, until)
}

/// Lowercase three-letter tag for a weekday, as used in reminder
/// schedules ("mon" .. "sun").
pub fn weekday_tag(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339() {
        let ts = parse_provider_timestamp("2026-01-15T17:00:00+01:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 1, 15, 16, 0, 0).unwrap());
    }

    #[test]
    fn parses_naive_iso_without_offset() {
        let ts = parse_provider_timestamp("2026-01-15T17:00:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 1, 15, 17, 0, 0).unwrap());
    }

    #[test]
    fn parses_space_separated() {
        let ts = parse_provider_timestamp("2026-01-15 17:00:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 1, 15, 17, 0, 0).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_provider_timestamp("tomorrow-ish").is_none());
    }

    #[test]
    fn window_defaults_to_now_plus_one_day() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let (from, until) = validity_window(None, Some("not a date"), now);
        assert_eq!(from, now);
        assert_eq!(until, now + Duration::days(1));
    }

    #[test]
    fn window_uses_parsable_bounds() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let (from, until) = validity_window(
            Some("2026-01-15T17:00:00"),
            Some("2026-01-16T17:00:00"),
            now,
        );
        assert_eq!(from, Utc.with_ymd_and_hms(2026, 1, 15, 17, 0, 0).unwrap());
        assert_eq!(until, Utc.with_ymd_and_hms(2026, 1, 16, 17, 0, 0).unwrap());
    }
}
