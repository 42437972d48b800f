//! Conversion of recorded date strings into comparable instants.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Normalizes an optional date string into a UTC instant.
///
/// Accepts RFC 3339 timestamps, offset-less date-times (read as UTC) and bare dates
/// (midnight UTC). Absent, empty or unparsable input yields `None`.
pub fn normalize(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(at.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|at| at.and_utc());
    }

    tracing::debug!(raw, "Ignoring unparsable timestamp");
    None
}

/// Renders an instant the way the report shows it (minute precision, UTC).
pub fn display(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_rfc3339() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(normalize(Some("2024-01-01T12:30:00Z")), Some(expected));
        assert_eq!(normalize(Some("2024-01-01T21:30:00+09:00")), Some(expected));
    }

    #[test]
    fn test_normalize_naive_forms() {
        assert_eq!(
            normalize(Some("2024-01-02")),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(
            normalize(Some("2024-01-02 08:15")),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 8, 15, 0).unwrap())
        );
        assert_eq!(
            normalize(Some("2024-01-02T08:15:42")),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 8, 15, 42).unwrap())
        );
    }

    #[test]
    fn test_normalize_absent_and_malformed() {
        assert_eq!(normalize(None), None);
        assert_eq!(normalize(Some("")), None);
        assert_eq!(normalize(Some("   ")), None);
        assert_eq!(normalize(Some("yesterday")), None);
        assert_eq!(normalize(Some("2024-13-45")), None);
    }

    #[test]
    fn test_display() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 59).unwrap();
        assert_eq!(display(&at), "2024-03-09 07:05");
    }
}
