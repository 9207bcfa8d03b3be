//! Trigger gate for periodic runs
//!
//! Runs are aligned to multiples of the trigger interval since the epoch,
//! so a timer firing slightly early still counts as the next slot.

use chrono::{DateTime, Duration, Utc};
use sk_core::duration_buffer;

/// First aligned slot strictly after `last`
pub fn next_allowed_time(last: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let interval = interval.num_seconds().max(1);
    let next = (last.timestamp().div_euclid(interval) + 1) * interval;
    DateTime::from_timestamp(next, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whether a periodic run is due, and the earliest time it would be
pub fn is_due(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    interval: Duration,
) -> (bool, Option<DateTime<Utc>>) {
    match last {
        None => (true, None),
        Some(last) => {
            let next = next_allowed_time(last, interval);
            (now > next - duration_buffer(), Some(next))
        }
    }
}
