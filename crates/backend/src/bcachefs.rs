//! bcachefs subvolume snapshots (experimental)

use crate::SnapMechanism;
use chrono::{DateTime, Utc};
use sk_core::{Error, ExecContext, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct Bcachefs;

impl SnapMechanism for Bcachefs {
    fn verify_volume(&self, ctx: &ExecContext, source: &str) -> bool {
        let fstype = match ctx.probe(&["stat", "-f", "--format=%T", source]) {
            Ok(out) => out,
            Err(_) => {
                warn!("Not bcachefs (cannot determine filesystem): {}", source);
                return false;
            }
        };
        if fstype.trim() != "bcachefs" {
            warn!("Not bcachefs (filesystem not bcachefs): {}", source);
            return false;
        }
        true
    }

    fn create(&self, ctx: &ExecContext, source: &str, destination: &str) -> Result<()> {
        warn!("BCACHEFS support is at a very early stage and experimental.");
        if ctx.probe(&["which", "bcachefs"]).is_err() {
            return Err(Error::Unsupported(
                "bcachefs snapshots without the bcachefs tool installed".to_string(),
            ));
        }
        ctx.execute(&["bcachefs", "subvolume", "snapshot", source, destination])
            .inspect_err(|_| error!("Unable to create snapshot using bcachefs."))
    }

    fn delete(&self, ctx: &ExecContext, destination: &str) -> Result<()> {
        ctx.execute(&["bcachefs", "subvolume", "delete", destination])
            .inspect_err(|_| error!("Unable to delete snapshot."))
    }

    fn rollback_gen(
        &self,
        _ctx: &ExecContext,
        _source_dests: &[(String, String)],
        _now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        Err(Error::Unsupported("rollback of bcachefs snapshots".to_string()))
    }

    fn sync_paths(&self, _ctx: &ExecContext, _paths: &BTreeSet<PathBuf>) -> Result<()> {
        Ok(())
    }
}
