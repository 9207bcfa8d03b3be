//! A single snapshot on disk and its metadata

use crate::metadata::{Metadata, Trigger};
use chrono::{DateTime, Utc};
use sk_backend::{Mechanism, SnapMechanism};
use sk_core::{interval, timestamp, Error, ExecContext, Result, SnapType};
use std::fs;
use std::path::PathBuf;
use tracing::{error, warn};

/// A snapshot directory, which may or may not exist yet
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    /// Full path, `<dest_prefix><YYYYMMDDhhmmss>`
    target: String,
    /// Always derived from the last 14 characters of `target`
    created: DateTime<Utc>,
    pub metadata: Metadata,
}

impl SnapshotRecord {
    /// A placeholder for `target` with empty metadata
    pub fn new(target: impl Into<String>) -> Result<Self> {
        let target = target.into();
        let created = timestamp::parse_suffix(&target)?;
        Ok(Self {
            target,
            created,
            metadata: Metadata::default(),
        })
    }

    /// Read `target` together with its sidecar file, if any
    pub fn load(target: impl Into<String>) -> Result<Self> {
        let mut record = Self::new(target)?;
        let path = record.metadata_path();
        if path.is_file() {
            match fs::read_to_string(&path) {
                Ok(text) => record.metadata = Metadata::from_json(&text, &record.target),
                Err(e) => warn!("Unable to read metadata file {}: {}", path.display(), e),
            }
        }
        Ok(record)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn metadata_path(&self) -> PathBuf {
        PathBuf::from(format!("{}-meta.json", self.target))
    }

    pub fn trigger(&self) -> Option<Trigger> {
        self.metadata.trigger
    }

    pub fn expiry(&self) -> Option<i64> {
        self.metadata.expiry
    }

    /// Backend of this snapshot; metadata without one predates multiple backends
    pub fn snap_type(&self) -> SnapType {
        match self.metadata.snap_type {
            Some(snap_type) => snap_type,
            None => {
                warn!("No snap_type in metadata of {}, assuming BTRFS", self.target);
                SnapType::Btrfs
            }
        }
    }

    /// TTL has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry().is_some_and(|expiry| expiry < now.timestamp())
    }

    pub fn save_metadata(&self, ctx: &ExecContext) -> Result<()> {
        ctx.write_file(&self.metadata_path(), &self.metadata.to_json()?)
    }

    /// Set expiry to `now + ttl_text`, or clear it for an empty string
    pub fn set_ttl(&mut self, ctx: &ExecContext, ttl_text: &str, now: DateTime<Utc>) -> Result<()> {
        self.metadata.expiry = if ttl_text.trim().is_empty() {
            None
        } else {
            let expiry = now
                .checked_add_signed(interval::parse_duration(ttl_text)?)
                .ok_or_else(|| Error::InvalidInterval(ttl_text.to_string()))?;
            Some(expiry.timestamp())
        };
        self.save_metadata(ctx)
    }

    /// Snapshot `source` into this record's target.
    ///
    /// Metadata is written first so a failed snapshot still leaves a trace.
    /// Returns false when the source does not pass the backend's checks.
    pub fn create_from(
        &mut self,
        ctx: &ExecContext,
        mechanism: &Mechanism,
        snap_type: SnapType,
        source: &str,
    ) -> Result<bool> {
        if !mechanism.verify_volume(ctx, source) {
            error!("Unable to validate source volume {} - aborting snapshot!", source);
            return Ok(false);
        }
        self.metadata.snap_type = Some(snap_type);
        self.metadata.source = source.to_string();
        self.save_metadata(ctx)?;
        mechanism.create(ctx, source, &self.target)?;
        Ok(true)
    }

    /// Remove the snapshot, then its sidecar file
    pub fn delete(&self, ctx: &ExecContext) -> Result<()> {
        Mechanism::for_type(self.snap_type()).delete(ctx, &self.target)?;
        ctx.remove_file(&self.metadata_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn target_in(dir: &TempDir, suffix: &str) -> String {
        format!("{}/@home-{}", dir.path().display(), suffix)
    }

    #[test]
    fn test_created_from_suffix() {
        let record = SnapshotRecord::new("/.snapshots/@home-20230213001000").unwrap();
        assert_eq!(
            record.created(),
            timestamp::parse_suffix("20230213001000").unwrap()
        );
        assert_eq!(
            record.metadata_path(),
            PathBuf::from("/.snapshots/@home-20230213001000-meta.json")
        );
        assert!(SnapshotRecord::new("/.snapshots/@home-latest").is_err());
    }

    #[test]
    fn test_metadata_roundtrip_on_disk() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let target = target_in(&temp_dir, "20230213001000");
        let ctx = ExecContext::new(false);

        let mut record = SnapshotRecord::new(&target)?;
        record.metadata.trigger = Some(Trigger::User);
        record.metadata.comment = "before upgrade".to_string();
        record.metadata.source = "/home".to_string();
        record.metadata.snap_type = Some(SnapType::Btrfs);
        record.save_metadata(&ctx)?;

        let loaded = SnapshotRecord::load(&target)?;
        assert_eq!(loaded, record);
        Ok(())
    }

    #[test]
    fn test_missing_or_corrupt_metadata() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let target = target_in(&temp_dir, "20230213001000");

        let loaded = SnapshotRecord::load(&target)?;
        assert_eq!(loaded.metadata, Metadata::default());
        assert_eq!(loaded.snap_type(), SnapType::Btrfs);

        fs::write(format!("{target}-meta.json"), "{broken")?;
        let loaded = SnapshotRecord::load(&target)?;
        assert_eq!(loaded.metadata, Metadata::default());
        Ok(())
    }

    #[test]
    fn test_expiry() {
        let mut record = SnapshotRecord::new("/s/@home-20230213001000").unwrap();
        let now = record.created() + Duration::hours(1);
        assert!(!record.is_expired(now));

        record.metadata.expiry = Some(now.timestamp() - 1);
        assert!(record.is_expired(now));

        record.metadata.expiry = Some(now.timestamp());
        assert!(!record.is_expired(now));
    }

    #[test]
    fn test_set_ttl() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let target = target_in(&temp_dir, "20230213001000");
        let ctx = ExecContext::new(false);
        let now = timestamp::parse_suffix("20230214000000")?;

        let mut record = SnapshotRecord::new(&target)?;
        record.set_ttl(&ctx, "1 day", now)?;
        assert_eq!(record.expiry(), Some(now.timestamp() + 86_400));
        assert_eq!(SnapshotRecord::load(&target)?.expiry(), record.expiry());

        record.set_ttl(&ctx, "", now)?;
        assert_eq!(SnapshotRecord::load(&target)?.expiry(), None);

        assert!(record.set_ttl(&ctx, "forever", now).is_err());
        // Out of range for a duration, then for a date
        assert!(record.set_ttl(&ctx, "300000000 years", now).is_err());
        assert!(record.set_ttl(&ctx, "1000000 years", now).is_err());
        assert_eq!(SnapshotRecord::load(&target)?.expiry(), None);
        Ok(())
    }

    #[test]
    fn test_dry_run_does_not_write() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let target = target_in(&temp_dir, "20230213001000");
        let ctx = ExecContext::new(true);

        let record = SnapshotRecord::new(&target)?;
        record.save_metadata(&ctx)?;
        assert!(!record.metadata_path().exists());
        Ok(())
    }
}
