//! Canonical timestamp handling for source tables.
//!
//! Source exports write timestamps as `YYYY-MM-DD HH:MM:SS`, occasionally
//! with fractional seconds, and date-only values for day-resolution columns.

use chrono::{NaiveDate, NaiveDateTime};

/// Canonical output format for timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a source timestamp. Returns `None` if the value matches none of the
/// accepted layouts; an empty value is also `None`.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_optional_timestamp(value: Option<&NaiveDateTime>) -> String {
    value.map(format_timestamp).unwrap_or_default()
}
