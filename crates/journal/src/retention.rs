//! Retention policies and time-bucketed deletion

use chrono::{DateTime, Duration, Utc};
use sk_core::{duration_buffer, Config, Error, Result};
use std::fmt::Debug;

/// Keep one snapshot in each of the last `keep` windows of length `period`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionRule {
    pub period: Duration,
    pub keep: u32,
}

impl RetentionRule {
    pub fn new(period: Duration, keep: u32) -> Result<Self> {
        if period <= Duration::zero() {
            return Err(Error::InvalidInterval(format!("retention period {period}")));
        }
        Ok(Self { period, keep })
    }
}

/// Ordered set of retention tiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    rules: Vec<RetentionRule>,
}

impl RetentionPolicy {
    pub fn new(rules: Vec<RetentionRule>) -> Self {
        Self { rules }
    }

    /// Hourly, daily, weekly, monthly and yearly tiers of a config.
    ///
    /// Every period is shortened by the duration buffer so that a snapshot
    /// taken slightly late by the timer still lands in its window.
    pub fn from_config(config: &Config) -> Self {
        let buffer = duration_buffer();
        let tiers = [
            (Duration::hours(1), config.keep_hourly),
            (Duration::days(1), config.keep_daily),
            (Duration::weeks(1), config.keep_weekly),
            (Duration::days(30), config.keep_monthly),
            // 365.24 days
            (Duration::seconds(31_556_736), config.keep_yearly),
        ];
        Self {
            rules: tiers
                .into_iter()
                .map(|(period, keep)| RetentionRule {
                    period: period - buffer,
                    keep,
                })
                .collect(),
        }
    }

    pub fn rules(&self) -> &[RetentionRule] {
        &self.rules
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_config(&Config::new("", "", ""))
    }
}

/// Decides which snapshots no retention tier needs any more
pub struct BucketDeletion {
    policy: RetentionPolicy,
}

impl BucketDeletion {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    /// Half-open windows `(now - (i+1)*period, now - i*period]` of every tier.
    ///
    /// Windows ending before `oldest` can hold no record and are not built.
    fn required_intervals(
        &self,
        now: DateTime<Utc>,
        oldest: DateTime<Utc>,
    ) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let mut intervals = Vec::new();
        for rule in self.policy.rules() {
            if rule.period <= Duration::zero() {
                continue;
            }
            let mut end = now;
            for _ in 0..rule.keep {
                if end < oldest {
                    break;
                }
                let Some(start) = end.checked_sub_signed(rule.period) else {
                    intervals.push((DateTime::<Utc>::MIN_UTC, end));
                    break;
                };
                intervals.push((start, end));
                end = start;
            }
        }
        intervals
    }

    /// Records not needed by any tier, in input order.
    ///
    /// `records` must be in non-decreasing time order and none may be later
    /// than `now`. Scanning from the oldest, a record is kept when it falls in
    /// a window not yet claimed; it then claims every window containing it.
    /// Append `(now, sentinel)` to ask whether a new snapshot is needed: the
    /// sentinel coming back means it is not.
    pub fn get_deletes<T: Debug>(
        &self,
        now: DateTime<Utc>,
        records: Vec<(DateTime<Utc>, T)>,
    ) -> Result<Vec<(DateTime<Utc>, T)>> {
        for pair in records.windows(2) {
            if pair[0].0 > pair[1].0 {
                return Err(Error::OutOfOrder {
                    prev: pair[0].0.to_rfc3339(),
                    next: pair[1].0.to_rfc3339(),
                });
            }
        }
        if let Some((time, _)) = records.iter().find(|(time, _)| *time > now) {
            return Err(Error::FutureRecord {
                time: time.to_rfc3339(),
                now: now.to_rfc3339(),
            });
        }

        let Some(&(oldest, _)) = records.first() else {
            return Ok(Vec::new());
        };
        let mut intervals = self.required_intervals(now, oldest);
        let mut deletes = Vec::new();
        for (time, id) in records {
            let before = intervals.len();
            intervals.retain(|(start, end)| !(*start < time && time <= *end));
            if intervals.len() == before {
                deletes.push((time, id));
            }
        }
        Ok(deletes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 2, 13, 12, 0, 0).unwrap()
    }

    fn engine(rules: &[(i64, u32)]) -> BucketDeletion {
        BucketDeletion::new(RetentionPolicy::new(
            rules
                .iter()
                .map(|&(secs, keep)| RetentionRule::new(Duration::seconds(secs), keep).unwrap())
                .collect(),
        ))
    }

    /// Offsets in seconds relative to `now()`; returns deleted offsets
    fn deletes(rules: &[(i64, u32)], offsets: &[i64]) -> Vec<i64> {
        let records = offsets
            .iter()
            .map(|&o| (now() + Duration::seconds(o), o))
            .collect();
        engine(rules)
            .get_deletes(now(), records)
            .unwrap()
            .into_iter()
            .map(|(_, o)| o)
            .collect()
    }

    #[test]
    fn test_single_rule_keep_one() {
        assert_eq!(deletes(&[(100, 1)], &[-210, -115, -5]), vec![-210, -115]);
        assert_eq!(deletes(&[(100, 1)], &[-115, -111, -5]), vec![-115, -111]);
        assert_eq!(deletes(&[(100, 1)], &[-115, -15, -5]), vec![-115, -5]);
    }

    #[test]
    fn test_single_rule_keep_two() {
        assert_eq!(deletes(&[(100, 2)], &[-210, -115, -5]), vec![-210]);
        assert_eq!(deletes(&[(100, 2)], &[-115, -111, -5]), vec![-111]);
        assert_eq!(deletes(&[(100, 2)], &[-115, -15, -5]), vec![-5]);
    }

    #[test]
    fn test_multiple_rules() {
        let records = [-115, -105, -25, -15, -5];
        assert_eq!(deletes(&[(100, 0), (10, 0)], &records), records.to_vec());
        assert_eq!(deletes(&[(100, 0), (10, 2)], &records), vec![-115, -105, -25]);
        assert_eq!(deletes(&[(100, 0), (10, 3)], &records), vec![-115, -105]);
        assert_eq!(deletes(&[(100, 0), (10, 4)], &records), vec![-115, -105]);
        assert!(deletes(&[(100, 0), (10, 40)], &records).is_empty());

        let records = [-115, -25, -15, -5];
        assert_eq!(deletes(&[(100, 2), (10, 0)], &records), vec![-15, -5]);
        assert_eq!(deletes(&[(100, 2), (10, 1)], &records), vec![-15]);
        assert!(deletes(&[(100, 2), (10, 2)], &records).is_empty());
        assert!(deletes(&[(100, 2), (10, 4)], &records).is_empty());
    }

    #[test]
    fn test_sentinel_signals_no_new_snapshot() {
        // A fresh snapshot already covers the newest window
        assert_eq!(deletes(&[(100, 1)], &[-5, 0]), vec![0]);
        // Nothing covers it yet
        assert_eq!(deletes(&[(100, 1)], &[-150, 0]), vec![-150]);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let records = vec![
            (now() - Duration::seconds(5), "b"),
            (now() - Duration::seconds(10), "a"),
        ];
        assert!(matches!(
            engine(&[(100, 1)]).get_deletes(now(), records),
            Err(Error::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_equal_times_allowed() {
        let records = vec![(now(), "existing"), (now(), "")];
        let result = engine(&[(100, 1)]).get_deletes(now(), records).unwrap();
        assert_eq!(result, vec![(now(), "")]);
    }

    #[test]
    fn test_future_rejected() {
        let records = vec![(now() + Duration::seconds(1), "x")];
        assert!(matches!(
            engine(&[(100, 1)]).get_deletes(now(), records),
            Err(Error::FutureRecord { .. })
        ));
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = Config::new("a.conf", "/", "/s/@r-");
        config.keep_hourly = 24;
        config.keep_yearly = 2;

        let policy = RetentionPolicy::from_config(&config);
        let rules = policy.rules();
        assert_eq!(rules.len(), 5);
        assert_eq!(rules[0], RetentionRule { period: Duration::minutes(57), keep: 24 });
        assert_eq!(rules[1].period, Duration::days(1) - Duration::minutes(3));
        assert_eq!(rules[1].keep, 5);
        assert_eq!(rules[4].period, Duration::seconds(31_556_736 - 180));
        assert_eq!(rules[4].keep, 2);
    }

    #[test]
    fn test_huge_keep_counts() {
        // Larger than i32::MAX
        let records = vec![(now() - Duration::minutes(5), "recent"), (now(), "")];
        let result = engine(&[(3_600, 3_000_000_000)])
            .get_deletes(now(), records)
            .unwrap();
        assert_eq!(result, vec![(now(), "")]);

        // Far more windows than the date range holds
        let mut config = Config::new("a.conf", "/", "/s/@r-");
        config.keep_yearly = 300_000;
        let records = vec![
            (now() - Duration::days(800), "old"),
            (now() - Duration::days(400), "mid"),
            (now(), ""),
        ];
        let result = BucketDeletion::new(RetentionPolicy::from_config(&config))
            .get_deletes(now(), records)
            .unwrap();
        assert!(result.is_empty());

        // A single window past the earliest representable date
        let far = engine(&[(i64::MAX / 1_000_000, u32::MAX)])
            .get_deletes(now(), vec![(now() - Duration::days(1), "a"), (now(), "")])
            .unwrap();
        assert_eq!(far, vec![(now(), "")]);
    }

    #[test]
    fn test_empty_records() {
        let result = engine(&[(100, 3)]).get_deletes(now(), Vec::<(DateTime<Utc>, ())>::new());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_rule_rejects_non_positive_period() {
        assert!(RetentionRule::new(Duration::zero(), 1).is_err());
        assert!(RetentionRule::new(Duration::seconds(-5), 1).is_err());
    }

    proptest! {
        #[test]
        fn prop_deletes_are_ordered_subset(
            mut offsets in prop::collection::vec(0i64..10_000, 0..40),
            keep_a in 0u32..5,
            keep_b in 0u32..5,
        ) {
            offsets.sort_unstable_by(|a, b| b.cmp(a));
            let records: Vec<(DateTime<Utc>, usize)> = offsets
                .iter()
                .enumerate()
                .map(|(i, &o)| (now() - Duration::seconds(o), i))
                .collect();

            let result = engine(&[(1_000, keep_a), (100, keep_b)])
                .get_deletes(now(), records.clone())
                .unwrap();

            // Indices come back in increasing order
            let ids: Vec<usize> = result.iter().map(|(_, i)| *i).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));

            // Never keeps more than there are windows
            let kept = records.len() - result.len();
            prop_assert!(kept <= (keep_a + keep_b) as usize);
        }

        #[test]
        fn prop_no_windows_deletes_everything(
            mut offsets in prop::collection::vec(0i64..10_000, 0..40),
        ) {
            offsets.sort_unstable_by(|a, b| b.cmp(a));
            let records: Vec<(DateTime<Utc>, i64)> = offsets
                .iter()
                .map(|&o| (now() - Duration::seconds(o), o))
                .collect();

            let result = engine(&[(1_000, 0), (100, 0)])
                .get_deletes(now(), records.clone())
                .unwrap();
            prop_assert_eq!(result, records);
        }
    }
}
