//! Parsing and formatting of the naive UTC timestamps stored in `sensor_data`.
//!
//! Any offset present in the input is applied before it is dropped, so
//! `2024-01-01T14:00:00+02:00` and `2024-01-01T12:00:00Z` name the same
//! stored value. Inputs without an offset are taken as UTC already.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Years accepted on input. Chrono reaches further than Postgres `TIMESTAMP`
/// does in both directions, so values are held to four-digit AD years.
const YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse ISO-8601 text into a naive UTC date-time.
///
/// A bare date (`YYYY-MM-DD`) yields midnight of that day. Values outside
/// years 1 to 9999 are rejected.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    parse_any(text.trim()).filter(storable)
}

fn parse_any(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.naive_utc());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    parse_date(text).map(start_of_day)
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .ok()
        .filter(|d| YEARS.contains(&d.year()))
}

/// Seconds since the Unix epoch (fractions allowed) as a naive UTC date-time.
pub fn from_epoch_seconds(secs: f64) -> Option<NaiveDateTime> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(whole as i64, nanos)
        .map(|dt| dt.naive_utc())
        .filter(storable)
}

fn storable(ts: &NaiveDateTime) -> bool {
    YEARS.contains(&ts.year())
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Last representable instant of `date` at the microsecond precision
/// Postgres stores.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    let last = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).expect("valid time of day");
    date.and_time(last)
}

/// `2024-01-01T12:00:00`, with fractional seconds only when present.
pub fn format_iso(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

pub fn now_utc() -> NaiveDateTime {
    Utc::now().naive_utc()
}
