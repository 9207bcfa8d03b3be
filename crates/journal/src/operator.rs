//! Per-source orchestration of snapshot creation and cleanup
//!
//! A [`SnapOperator`] is built for one configured source at a fixed `now`.
//! Every decision is re-derived from what is on disk, so an interrupted run
//! is simply continued by the next one.

use crate::bounded;
use crate::gate;
use crate::journal::Journal;
use crate::metadata::Trigger;
use crate::retention::{BucketDeletion, RetentionPolicy};
use crate::snapshot::SnapshotRecord;
use crate::ttl::TtlAssignment;
use chrono::{DateTime, Utc};
use serde_json::json;
use sk_backend::{Mechanism, SnapMechanism};
use sk_core::{interval, timestamp, Config, ExecContext, Result};
use tracing::{info, warn};

/// One line of the human readable listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    /// Target with the destination prefix removed
    pub suffix: String,
    /// `S`, `I` and `U` in fixed columns, blank where not matching
    pub indicator: String,
    pub age: String,
    /// Time left until expiry
    pub ttl: Option<String>,
    pub comment: String,
}

pub struct SnapOperator<'a> {
    config: &'a Config,
    ctx: &'a ExecContext,
    now: DateTime<Utc>,
    mechanism: Mechanism,
    journal: Journal,
    snaps_created: bool,
    snaps_deleted: bool,
}

impl<'a> SnapOperator<'a> {
    pub fn new(config: &'a Config, now: DateTime<Utc>, ctx: &'a ExecContext) -> Self {
        Self {
            config,
            ctx,
            now,
            mechanism: Mechanism::for_type(config.snap_type),
            journal: Journal::new(config),
            snaps_created: false,
            snaps_deleted: false,
        }
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    /// Any snapshot was created by this operator
    pub fn snaps_created(&self) -> bool {
        self.snaps_created
    }

    /// Any snapshot was deleted by this operator
    pub fn snaps_deleted(&self) -> bool {
        self.snaps_deleted
    }

    pub fn snapshots(&self) -> Result<Vec<SnapshotRecord>> {
        self.journal.snapshots()
    }

    pub fn find_target(&self, suffix: &str) -> Result<Option<SnapshotRecord>> {
        self.journal.find_target(suffix)
    }

    /// Periodic entry point, called by the timer.
    ///
    /// Expired snapshots are removed on every run. Retention and creation
    /// only happen once per trigger interval. Deletions are carried out
    /// before the new snapshot is taken.
    pub fn scheduled(&mut self) -> Result<()> {
        if !self.mechanism.verify_volume(self.ctx, &self.config.source) {
            warn!("Incompatible volume: {}", self.config.source);
            return Ok(());
        }

        let mut to_delete = Vec::new();
        let mut scheduled = Vec::new();
        for record in self.journal.snapshots()? {
            if record.is_expired(self.now) {
                info!("Expired snapshot: {}", record.target());
                to_delete.push(record);
            } else if record.trigger() == Some(Trigger::Scheduled) {
                scheduled.push(record);
            }
        }

        let create = self.plan_scheduled(&scheduled, &mut to_delete)?;

        for record in &to_delete {
            self.delete_record(record)?;
        }
        if let Some(ttl) = create {
            let expiry = (ttl > 0).then(|| self.now.timestamp().saturating_add(ttl));
            self.create_record(Trigger::Scheduled, None, expiry)?;
        }
        Ok(())
    }

    /// TTL of the scheduled snapshot to create, 0 for none, or None when no
    /// snapshot is needed. Queues superfluous snapshots into `to_delete`.
    fn plan_scheduled(
        &self,
        scheduled: &[SnapshotRecord],
        to_delete: &mut Vec<SnapshotRecord>,
    ) -> Result<Option<i64>> {
        let last = scheduled.last().map(SnapshotRecord::created);
        if let (false, Some(next)) = gate::is_due(last, self.now, self.config.trigger_interval) {
            info!("Already triggered for {}, wait until {}", self.config.source, next);
            return Ok(None);
        }

        let (need_new, ttl) = self.scheduled_ttl(scheduled);
        if !need_new && ttl != 0 {
            warn!(
                "Inconsistent TTL decision for {}: need_new={}, ttl={}",
                self.config.source, need_new, ttl
            );
        }

        // The trailing `None` stands for the snapshot that would be taken now
        let mut candidates: Vec<(DateTime<Utc>, Option<&SnapshotRecord>)> = scheduled
            .iter()
            .map(|record| (record.created(), Some(record)))
            .collect();
        candidates.push((self.now, None));

        let engine = BucketDeletion::new(RetentionPolicy::from_config(self.config));
        for (when, record) in engine.get_deletes(self.now, candidates)? {
            let Some(record) = record else {
                info!("No new backup needed for {}", self.config.source);
                return Ok(need_new.then_some(ttl));
            };
            let elapsed = (self.now - when).num_seconds();
            if elapsed <= self.config.min_keep_secs {
                info!("Not enough time passed, not deleting {}", record.target());
            } else if record.expiry().is_some() {
                // Removed once its TTL passes
                info!("Refusing to clean up target with TTL: {}", record.target());
            } else {
                to_delete.push(record.clone());
            }
        }

        Ok(Some(if need_new { ttl } else { 0 }))
    }

    fn scheduled_ttl(&self, scheduled: &[SnapshotRecord]) -> (bool, i64) {
        if !self.config.enable_scheduled_ttl {
            return (false, 0);
        }
        let pairs: Vec<(DateTime<Utc>, Option<i64>)> = scheduled
            .iter()
            .map(|record| (record.created(), record.expiry()))
            .collect();
        match TtlAssignment::new(RetentionPolicy::from_config(self.config))
            .ttl_of_new_snapshot(self.now, &pairs)
        {
            Some(ttl) => (true, ttl),
            None => (false, 0),
        }
    }

    /// Package manager hook. Skipped if the last install snapshot is recent.
    pub fn on_install_hook(&mut self, comment: Option<String>) -> Result<()> {
        let last = self
            .journal
            .snapshots()?
            .into_iter()
            .rfind(|record| record.trigger() == Some(Trigger::Install));
        if let Some(last) = last {
            let since = self.now - last.created();
            if since < self.config.preinstall_interval {
                info!(
                    "Only {}s has passed since last install, need {}s. Skipping.",
                    since.num_seconds(),
                    self.config.preinstall_interval.num_seconds()
                );
                return Ok(());
            }
        }
        self.create_and_maintain(self.config.keep_preinstall, Trigger::Install, comment)
    }

    /// Explicit user request
    pub fn create(&mut self, comment: Option<String>) -> Result<()> {
        let config = self.config;
        self.create_and_maintain(config.keep_user, Trigger::User, comment)
            .inspect_err(|e| {
                if e.is_permission_denied() {
                    eprintln!(
                        "Could not perform snap for {}; run as root?",
                        config.config_file.display()
                    );
                }
            })
    }

    fn create_and_maintain(
        &mut self,
        count: i64,
        trigger: Trigger,
        comment: Option<String>,
    ) -> Result<()> {
        info!("Maintain {} volumes of type {}", count, trigger);
        if !self.mechanism.verify_volume(self.ctx, &self.config.source) {
            warn!("Not a compatible volume {}", self.config.source);
            return Ok(());
        }

        // Collected before creating, so dry-run sees the same set
        let previous: Vec<SnapshotRecord> = self
            .journal
            .snapshots()?
            .into_iter()
            .filter(|record| record.trigger() == Some(trigger))
            .collect();

        let plan = bounded::maintain(count, &previous)?;
        if plan.create {
            self.create_record(trigger, comment, None)?;
        }
        for record in &plan.delete {
            self.delete_record(record)?;
        }
        Ok(())
    }

    fn create_record(
        &mut self,
        trigger: Trigger,
        comment: Option<String>,
        expiry: Option<i64>,
    ) -> Result<()> {
        let target = format!(
            "{}{}",
            self.config.dest_prefix,
            timestamp::format_suffix(self.now)
        );
        let mut record = SnapshotRecord::new(target)?;
        record.metadata.trigger = Some(trigger);
        record.metadata.comment = comment.unwrap_or_default();
        record.metadata.expiry = expiry;

        if record.create_from(
            self.ctx,
            &self.mechanism,
            self.config.snap_type,
            &self.config.source,
        )? {
            self.snaps_created = true;
        }
        Ok(())
    }

    pub fn delete_record(&mut self, record: &SnapshotRecord) -> Result<()> {
        record.delete(self.ctx)?;
        self.snaps_deleted = true;
        Ok(())
    }

    /// Returns false if no snapshot matched `suffix`
    pub fn delete_target(&mut self, suffix: &str) -> Result<bool> {
        match self.journal.find_target(suffix)? {
            Some(record) => {
                self.delete_record(&record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns false if no snapshot matched `suffix`
    pub fn set_ttl(&self, suffix: &str, ttl: &str) -> Result<bool> {
        match self.journal.find_target(suffix)? {
            Some(mut record) => {
                record.set_ttl(self.ctx, ttl, self.now)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn suffix_of<'r>(&self, record: &'r SnapshotRecord) -> &'r str {
        record
            .target()
            .strip_prefix(self.config.dest_prefix.as_str())
            .unwrap_or(record.target())
    }

    pub fn list_rows(&self) -> Result<Vec<ListRow>> {
        // Only for the warnings it logs
        let _ = self.mechanism.verify_volume(self.ctx, &self.config.source);

        Ok(self
            .journal
            .snapshots()?
            .iter()
            .map(|record| self.list_row(record))
            .collect())
    }

    pub fn list_row(&self, record: &SnapshotRecord) -> ListRow {
        let indicator = Trigger::ALL
            .iter()
            .map(|t| {
                if record.trigger() == Some(*t) {
                    t.indicator()
                } else {
                    ' '
                }
            })
            .collect();
        let elapsed = (self.now - record.created()).num_seconds() as f64;
        ListRow {
            suffix: self.suffix_of(record).to_string(),
            indicator,
            age: format!("({} ago)", interval::humanize(elapsed)),
            ttl: record
                .expiry()
                .map(|expiry| interval::humanize((expiry - self.now.timestamp()) as f64)),
            comment: record.metadata.comment.clone(),
        }
    }

    /// One compact JSON object per snapshot, keys sorted
    pub fn list_json(&self) -> Result<Vec<String>> {
        let _ = self.mechanism.verify_volume(self.ctx, &self.config.source);

        self.journal
            .snapshots()?
            .iter()
            .map(|record| {
                let mut entry = json!({
                    "comment": record.metadata.comment,
                    "config_file": self.config.config_file.display().to_string(),
                    "file": {
                        "prefix": self.config.dest_prefix,
                        "timestamp": self.suffix_of(record),
                    },
                    "source": self.config.source,
                    "trigger": record.trigger().map(|t| t.to_string()).unwrap_or_default(),
                });
                if let Some(expiry) = record.expiry() {
                    entry["expiry"] = json!(expiry);
                }
                Ok(serde_json::to_string(&entry)?)
            })
            .collect()
    }
}
