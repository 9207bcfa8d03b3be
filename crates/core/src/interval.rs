//! Human readable time intervals
//!
//! Follows the unit names of `man systemd.time`, e.g. `"10 hr"` is 36000
//! seconds. Units are case sensitive: `m` is minutes, `M` is months.

use crate::{Error, Result};
use chrono::Duration;
use regex::Regex;
use std::sync::LazyLock;

const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;
const WEEK: f64 = 7.0 * DAY;

/// Unit synonyms and their length in seconds
const UNITS: &[(&[&str], f64)] = &[
    (&["usec", "us", "µs"], 1e-6),
    (&["msec", "ms"], 1e-3),
    (&["seconds", "second", "sec", "s"], 1.0),
    (&["minutes", "minute", "min", "m"], MINUTE),
    (&["hours", "hour", "hr", "h"], HOUR),
    (&["days", "day", "d"], DAY),
    (&["weeks", "week", "w"], WEEK),
    (&["months", "month", "M"], 30.44 * DAY),
    (&["years", "year", "y"], 365.24 * DAY),
];

/// Suffixes used by [`humanize`], largest first
const SUFFIXES: &[(f64, &str)] = &[
    (365.24 * DAY, "year"),
    (30.0 * DAY, "month"),
    (WEEK, "week"),
    (DAY, "day"),
    (HOUR, "h"),
    (MINUTE, "m"),
    (1.0, "s"),
];

/// Units smaller than this fraction of the largest printed unit are dropped
const ACCURACY: f64 = 0.01;

#[allow(clippy::expect_used)]
static INTERVAL: LazyLock<Regex> = LazyLock::new(|| {
    let mut names: Vec<&str> = UNITS.iter().flat_map(|(names, _)| names.iter().copied()).collect();
    names.sort_unstable();
    let pattern = format!(
        r"^\s*(?P<value>[0-9]*\.?[0-9]*)\s*(?P<unit>{})\s*$",
        names.join("|")
    );
    Regex::new(&pattern).expect("constant regex pattern is valid")
});

fn unit_secs(unit: &str) -> Option<f64> {
    UNITS
        .iter()
        .find(|(names, _)| names.contains(&unit))
        .map(|(_, secs)| *secs)
}

/// Parse `<number><unit>` into seconds
pub fn parse_to_secs(text: &str) -> Result<f64> {
    let invalid = || Error::InvalidInterval(text.to_string());

    let caps = INTERVAL.captures(text).ok_or_else(invalid)?;
    let value: f64 = caps["value"].parse().map_err(|_| invalid())?;
    let unit = unit_secs(&caps["unit"]).ok_or_else(invalid)?;

    Ok(value * unit)
}

/// [`parse_to_secs`] rounded to whole seconds
pub fn parse_duration(text: &str) -> Result<Duration> {
    let secs = parse_to_secs(text)?;
    Duration::try_seconds(secs.round() as i64)
        .ok_or_else(|| Error::InvalidInterval(text.to_string()))
}

/// Render seconds as a compact human string, e.g. `"4 days 1h"`
pub fn humanize(seconds: f64) -> String {
    let (prefix, mut remaining) = if seconds < 0.0 {
        ("-", -seconds)
    } else {
        ("", seconds)
    };

    let mut parts = Vec::new();
    let mut largest: Option<f64> = None;
    for &(duration, suffix) in SUFFIXES {
        if remaining < duration {
            continue;
        }
        let count = (remaining / duration).floor();
        remaining -= count * duration;

        match largest {
            None => largest = Some(duration),
            Some(largest) if duration < largest * ACCURACY => break,
            Some(_) => {}
        }
        if count == 0.0 {
            continue;
        }

        if suffix.len() > 1 {
            let plural = if count > 1.0 { "s" } else { "" };
            parts.push(format!("{count:.0} {suffix}{plural}"));
        } else {
            parts.push(format!("{count:.0}{suffix}"));
        }
    }

    format!("{prefix}{}", parts.join(" "))
}
