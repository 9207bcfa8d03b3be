//! TTL assignment for new scheduled snapshots
//!
//! Instead of deleting old snapshots on every run, each new snapshot can be
//! created with an expiry long enough to cover every retention window it
//! will need to fill. Expired snapshots are then removed unconditionally.

use crate::retention::RetentionPolicy;
use chrono::{DateTime, Utc};
use sk_core::DURATION_BUFFER_SECS;

/// Computes the TTL a snapshot taken now should carry
pub struct TtlAssignment {
    policy: RetentionPolicy,
}

impl TtlAssignment {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    /// TTL in seconds for a snapshot created at `now`, or None if no tier
    /// needs one.
    ///
    /// `records` are `(created, expiry)` pairs of existing snapshots, oldest
    /// first; records without an expiry are ignored. For every tier, a
    /// snapshot still counts when it lives long enough, is old enough, and
    /// neither expires nor falls out of the tier's range soon. A record
    /// younger than one period means this tier was already served recently.
    pub fn ttl_of_new_snapshot(
        &self,
        now: DateTime<Utc>,
        records: &[(DateTime<Utc>, Option<i64>)],
    ) -> Option<i64> {
        let now_s = now.timestamp();
        let eps = DURATION_BUFFER_SECS;
        let mut ttl: Option<i64> = None;

        for rule in self.policy.rules() {
            let period = rule.period.num_seconds();
            let keep = i64::from(rule.keep);
            let span = period.saturating_mul(keep);
            let mut count = 0;
            let mut recent = false;

            for (created, expiry) in records {
                let Some(expiry) = *expiry else {
                    continue;
                };
                let created = created.timestamp();
                if expiry - created < period - eps {
                    continue;
                }
                if now_s - created < period - eps {
                    recent = true;
                    break;
                }
                if expiry - now_s <= period + eps {
                    continue;
                }
                if created <= now_s.saturating_sub(span) + eps {
                    continue;
                }
                count += 1;
            }

            if !recent && count < keep {
                ttl = Some(ttl.map_or(span, |current| current.max(span)));
            }
        }
        ttl
    }
}
