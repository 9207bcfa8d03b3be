//! Filters for deleting many snapshots at once

use crate::metadata::Trigger;
use crate::snapshot::SnapshotRecord;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFilter {
    /// Snapshots created by this trigger
    Indicator(Trigger),
    /// `start <= created < end`; an open side is unbounded
    TimeRange {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
}

impl SnapshotFilter {
    pub fn matches(&self, record: &SnapshotRecord) -> bool {
        match self {
            SnapshotFilter::Indicator(trigger) => record.trigger() == Some(*trigger),
            SnapshotFilter::TimeRange { start, end } => {
                let created = record.created();
                start.map_or(true, |start| start <= created)
                    && end.map_or(true, |end| created < end)
            }
        }
    }

    /// Records matching every filter, in their original order
    pub fn apply(filters: &[SnapshotFilter], records: Vec<SnapshotRecord>) -> Vec<SnapshotRecord> {
        records
            .into_iter()
            .filter(|record| filters.iter().all(|filter| filter.matches(record)))
            .collect()
    }
}
