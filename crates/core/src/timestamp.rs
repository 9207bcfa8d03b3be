//! Snapshot identity timestamps
//!
//! A snapshot directory is named `<dest_prefix><YYYYMMDDhhmmss>`. The creation
//! time of a snapshot is always read back from those trailing 14 characters,
//! interpreted in the host's local time zone.

use crate::{Error, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// strftime pattern of the identity suffix
pub const TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Length of a formatted identity suffix
pub const TIME_FORMAT_LEN: usize = 14;

/// Slack (in seconds) absorbing jitter of the periodic timer
pub const DURATION_BUFFER_SECS: i64 = 3 * 60;

/// [`DURATION_BUFFER_SECS`] as a duration
pub fn duration_buffer() -> Duration {
    Duration::seconds(DURATION_BUFFER_SECS)
}

/// Format `when` as an identity suffix
pub fn format_suffix(when: DateTime<Utc>) -> String {
    when.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

/// Parse the creation time from the last 14 characters of a snapshot path
pub fn parse_suffix(target: &str) -> Result<DateTime<Utc>> {
    let start = target
        .len()
        .checked_sub(TIME_FORMAT_LEN)
        .ok_or_else(|| Error::InvalidTimestamp(target.to_string()))?;
    let suffix = target
        .get(start..)
        .ok_or_else(|| Error::InvalidTimestamp(target.to_string()))?;

    // Reject signs and whitespace that chrono would otherwise tolerate
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidTimestamp(target.to_string()));
    }

    let naive = NaiveDateTime::parse_from_str(suffix, TIME_FORMAT)
        .map_err(|_| Error::InvalidTimestamp(target.to_string()))?;
    from_local(naive).ok_or_else(|| Error::InvalidTimestamp(target.to_string()))
}

/// Parse a user supplied point in time.
///
/// Accepts an identity suffix (`20241101201015`) or an ISO-like string
/// (`2024-11-01`, `2024-11-01 20:10`, `2024-11-01T20:10:15`, `2024-11-01_20:10:15`).
pub fn parse_user_time(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if text.len() == TIME_FORMAT_LEN && text.bytes().all(|b| b.is_ascii_digit()) {
        return parse_suffix(text);
    }

    let invalid = || {
        Error::InvalidTimestamp(format!(
            "{text} (expected YYYYMMDDhhmmss or an ISO 8601 string such as 2024-11-01_20:10:15)"
        ))
    };

    let naive = if text.len() == 10 {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    } else {
        // Normalize the date/time separator
        let normalized: String = text
            .char_indices()
            .map(|(i, c)| if i == 10 && matches!(c, 'T' | '_') { ' ' } else { c })
            .collect();
        NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M"))
            .ok()
    };

    naive.and_then(from_local).ok_or_else(invalid)
}

fn from_local(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
