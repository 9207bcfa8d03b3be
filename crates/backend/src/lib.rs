//! Snapshot backends
//!
//! This crate provides:
//! - The [`SnapMechanism`] trait every backend implements
//! - btrfs, rsync and bcachefs backends
//! - [`Mechanism`], the closed set of backends selected by [`SnapType`]
//! - Mount table parsing and btrfs rollback script generation

pub mod bcachefs;
pub mod btrfs;
pub mod mtab;
pub mod rollback;
pub mod rsync;

use chrono::{DateTime, Utc};
use sk_core::{ExecContext, Result, SnapType};
use std::collections::BTreeSet;
use std::path::PathBuf;

// Re-exports
pub use bcachefs::Bcachefs;
pub use btrfs::Btrfs;
pub use rsync::Rsync;

/// Operations a snapshot backend must support
pub trait SnapMechanism {
    /// Whether `source` can be snapshotted by this backend. Problems are logged.
    fn verify_volume(&self, ctx: &ExecContext, source: &str) -> bool;

    /// Snapshot `source` into `destination`
    fn create(&self, ctx: &ExecContext, source: &str, destination: &str) -> Result<()>;

    /// Remove the snapshot at `destination`
    fn delete(&self, ctx: &ExecContext, destination: &str) -> Result<()>;

    /// Shell script lines restoring each `(source, snapshot)` pair
    fn rollback_gen(
        &self,
        ctx: &ExecContext,
        source_dests: &[(String, String)],
        now: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    /// Wait for pending deletions under the given mount paths to settle
    fn sync_paths(&self, ctx: &ExecContext, paths: &BTreeSet<PathBuf>) -> Result<()>;
}

/// The backend selected for a source
#[derive(Debug, Clone)]
pub enum Mechanism {
    Btrfs(Btrfs),
    Rsync(Rsync),
    Bcachefs(Bcachefs),
}

impl Mechanism {
    pub fn for_type(snap_type: SnapType) -> Self {
        match snap_type {
            SnapType::Btrfs => Mechanism::Btrfs(Btrfs::default()),
            SnapType::Rsync => Mechanism::Rsync(Rsync),
            SnapType::Bcachefs => Mechanism::Bcachefs(Bcachefs),
        }
    }
}

impl SnapMechanism for Mechanism {
    fn verify_volume(&self, ctx: &ExecContext, source: &str) -> bool {
        match self {
            Mechanism::Btrfs(m) => m.verify_volume(ctx, source),
            Mechanism::Rsync(m) => m.verify_volume(ctx, source),
            Mechanism::Bcachefs(m) => m.verify_volume(ctx, source),
        }
    }

    fn create(&self, ctx: &ExecContext, source: &str, destination: &str) -> Result<()> {
        match self {
            Mechanism::Btrfs(m) => m.create(ctx, source, destination),
            Mechanism::Rsync(m) => m.create(ctx, source, destination),
            Mechanism::Bcachefs(m) => m.create(ctx, source, destination),
        }
    }

    fn delete(&self, ctx: &ExecContext, destination: &str) -> Result<()> {
        match self {
            Mechanism::Btrfs(m) => m.delete(ctx, destination),
            Mechanism::Rsync(m) => m.delete(ctx, destination),
            Mechanism::Bcachefs(m) => m.delete(ctx, destination),
        }
    }

    fn rollback_gen(
        &self,
        ctx: &ExecContext,
        source_dests: &[(String, String)],
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        match self {
            Mechanism::Btrfs(m) => m.rollback_gen(ctx, source_dests, now),
            Mechanism::Rsync(m) => m.rollback_gen(ctx, source_dests, now),
            Mechanism::Bcachefs(m) => m.rollback_gen(ctx, source_dests, now),
        }
    }

    fn sync_paths(&self, ctx: &ExecContext, paths: &BTreeSet<PathBuf>) -> Result<()> {
        match self {
            Mechanism::Btrfs(m) => m.sync_paths(ctx, paths),
            Mechanism::Rsync(m) => m.sync_paths(ctx, paths),
            Mechanism::Bcachefs(m) => m.sync_paths(ctx, paths),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_type_selects_backend() {
        assert!(matches!(Mechanism::for_type(SnapType::Btrfs), Mechanism::Btrfs(_)));
        assert!(matches!(Mechanism::for_type(SnapType::Rsync), Mechanism::Rsync(_)));
        assert!(matches!(Mechanism::for_type(SnapType::Bcachefs), Mechanism::Bcachefs(_)));
    }
}
