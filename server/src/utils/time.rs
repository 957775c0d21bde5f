//! Time utility functions

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Text format ClickHouse accepts for `DateTime64(3)` parameters
pub const DATETIME64_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Naive layouts accepted in addition to RFC 3339 (interpreted as UTC)
const NAIVE_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Normalize an ISO-8601 timestamp to the store's `DateTime64(3)` text form.
///
/// RFC 3339 input with an offset is converted to UTC first, so
/// `2025-03-01T10:00:00+02:00` becomes `2025-03-01 08:00:00.000`. Input that
/// is already in store form (`2025-03-31 23:59:59`) or a bare date is accepted
/// as UTC. Returns `None` for anything else.
pub fn to_datetime64_text(ts: &str) -> Option<String> {
    parse_datetime64(ts, false)
}

/// Like [`to_datetime64_text`], but a bare date means the last millisecond of
/// that day, so an inclusive upper bound of `2025-01-31` keeps the whole day.
pub fn to_datetime64_end_text(ts: &str) -> Option<String> {
    parse_datetime64(ts, true)
}

fn parse_datetime64(ts: &str, end_of_day: bool) -> Option<String> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(format_datetime64(&dt.with_timezone(&Utc)));
    }

    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(ts, layout) {
            return Some(naive.format(DATETIME64_FORMAT).to_string());
        }
    }

    NaiveDate::parse_from_str(ts, "%Y-%m-%d")
        .ok()
        .and_then(|d| {
            if end_of_day {
                d.and_hms_milli_opt(23, 59, 59, 999)
            } else {
                d.and_hms_opt(0, 0, 0)
            }
        })
        .map(|naive| naive.format(DATETIME64_FORMAT).to_string())
}

/// Format a UTC datetime as `DateTime64(3)` text
pub fn format_datetime64(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME64_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rfc3339_zulu() {
        assert_eq!(
            to_datetime64_text("2025-03-01T10:00:00Z").as_deref(),
            Some("2025-03-01 10:00:00.000")
        );
    }

    #[test]
    fn test_rfc3339_with_millis() {
        assert_eq!(
            to_datetime64_text("2025-03-01T10:00:00.123Z").as_deref(),
            Some("2025-03-01 10:00:00.123")
        );
    }

    #[test]
    fn test_rfc3339_offset_converted_to_utc() {
        assert_eq!(
            to_datetime64_text("2025-03-01T10:00:00+02:00").as_deref(),
            Some("2025-03-01 08:00:00.000")
        );
    }

    #[test]
    fn test_store_format_passthrough() {
        assert_eq!(
            to_datetime64_text("2025-03-31 23:59:59").as_deref(),
            Some("2025-03-31 23:59:59.000")
        );
    }

    #[test]
    fn test_naive_with_t_separator() {
        assert_eq!(
            to_datetime64_text("2025-03-31T23:59:59").as_deref(),
            Some("2025-03-31 23:59:59.000")
        );
    }

    #[test]
    fn test_bare_date() {
        assert_eq!(
            to_datetime64_text("2025-03-31").as_deref(),
            Some("2025-03-31 00:00:00.000")
        );
    }

    #[test]
    fn test_bare_date_as_end_of_day() {
        assert_eq!(
            to_datetime64_end_text("2025-01-31").as_deref(),
            Some("2025-01-31 23:59:59.999")
        );
        // Explicit times are kept
        assert_eq!(
            to_datetime64_end_text("2025-01-31T12:00:00Z").as_deref(),
            Some("2025-01-31 12:00:00.000")
        );
        assert_eq!(to_datetime64_end_text("soon"), None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(to_datetime64_text(""), None);
        assert_eq!(to_datetime64_text("yesterday"), None);
        assert_eq!(to_datetime64_text("2025-13-01T00:00:00Z"), None);
        assert_eq!(to_datetime64_text("1' OR '1'='1"), None);
    }

    #[test]
    fn test_format_datetime64() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_datetime64(&dt), "2024-01-02 03:04:05.000");
    }
}
