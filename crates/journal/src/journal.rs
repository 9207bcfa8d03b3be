//! Snapshots present at a destination
//!
//! There is no separate index: the snapshot directories themselves, plus
//! their sidecar files, are the source of truth. Every scan re-derives the
//! state from disk.

use crate::snapshot::SnapshotRecord;
use sk_core::timestamp::TIME_FORMAT_LEN;
use sk_core::{Config, Error, Result};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

/// Snapshots sharing one destination prefix
#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
    name_prefix: String,
}

impl Journal {
    pub fn new(config: &Config) -> Self {
        Self {
            dir: config.mount_path(),
            name_prefix: config.name_prefix().to_string(),
        }
    }

    /// All snapshots in chronological order
    pub fn snapshots(&self) -> Result<Vec<SnapshotRecord>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("Snapshot directory {} does not exist yet", self.dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(&self.name_prefix) || !entry.path().is_dir() {
                continue;
            }

            let target = self.dir.join(name).to_string_lossy().into_owned();
            match SnapshotRecord::load(target.as_str()) {
                Ok(record) => records.push(record),
                Err(_) => warn!("Could not parse timestamp, ignoring: {}", target),
            }
        }

        records.sort_by(|a, b| {
            a.created()
                .cmp(&b.created())
                .then_with(|| a.target().cmp(b.target()))
        });
        Ok(records)
    }

    /// First snapshot whose path ends with `suffix`
    pub fn find_target(&self, suffix: &str) -> Result<Option<SnapshotRecord>> {
        if suffix.chars().count() < TIME_FORMAT_LEN {
            return Err(Error::SuffixTooShort(suffix.to_string()));
        }
        Ok(self
            .snapshots()?
            .into_iter()
            .find(|record| record.target().ends_with(suffix)))
    }
}
