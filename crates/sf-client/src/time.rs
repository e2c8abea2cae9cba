//! Timestamp parsing for the formats the platform emits.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::{Error, ErrorKind, Result};

/// `2024-01-15T10:30:00.000+0000`, the REST API's datetime shape.
pub const SALESFORCE_DATETIME: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";
/// `2024-01-15`, used by date fields.
pub const SALESFORCE_DATE: &str = "%Y-%m-%d";

/// Parse a platform timestamp.
///
/// Tries RFC 3339, then [`SALESFORCE_DATETIME`], then [`SALESFORCE_DATE`]
/// (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, SALESFORCE_DATETIME) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, SALESFORCE_DATE)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(Error::new(ErrorKind::Json(format!(
        "unrecognised timestamp: {raw}"
    ))))
}

/// Format a timestamp as RFC 3339 with a `Z` suffix and whole seconds.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
