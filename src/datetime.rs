//! Date/time utilities for Quill.
//!
//! Timestamps are stored as fixed-width UTC text so that SQL string
//! comparison orders them chronologically.

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{QuillError, Result};

/// Storage format for timestamps (`YYYY-MM-DD HH:MM:SS.ffffff`).
pub const DB_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format a UTC datetime for storage.
pub fn to_db(dt: &DateTime<Utc>) -> String {
    dt.format(DB_FORMAT).to_string()
}

/// Parse a stored timestamp.
///
/// Accepts the storage format and plain SQLite `datetime('now')` output.
pub fn from_db(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, DB_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn span(secs: u64) -> Result<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| QuillError::Config(format!("duration of {secs}s is out of range")))
}

/// `dt` moved `secs` seconds forward.
///
/// A result outside chrono's range is reported as a configuration error.
pub fn add_secs(dt: DateTime<Utc>, secs: u64) -> Result<DateTime<Utc>> {
    dt.checked_add_signed(span(secs)?)
        .ok_or_else(|| QuillError::Config(format!("{dt} + {secs}s is out of range")))
}

/// `dt` moved `secs` seconds back.
pub fn sub_secs(dt: DateTime<Utc>, secs: u64) -> Result<DateTime<Utc>> {
    dt.checked_sub_signed(span(secs)?)
        .ok_or_else(|| QuillError::Config(format!("{dt} - {secs}s is out of range")))
}

/// Convert a stored timestamp to RFC3339 for API responses.
///
/// Unparseable input is returned unchanged.
pub fn to_rfc3339(datetime_str: &str) -> String {
    match from_db(datetime_str) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => datetime_str.to_string(),
    }
}
