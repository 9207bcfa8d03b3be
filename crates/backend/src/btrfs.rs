//! btrfs subvolume snapshots

use crate::mtab::MountTable;
use crate::rollback;
use crate::SnapMechanism;
use chrono::{DateTime, Utc};
use sk_core::{Error, ExecContext, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{error, warn};

/// Inode number of the root directory of every btrfs subvolume
const SUBVOLUME_ROOT_INODE: &str = "256";

#[derive(Debug, Clone)]
pub struct Btrfs {
    /// Mount table consulted by rollback generation
    pub mtab_path: PathBuf,
}

impl Default for Btrfs {
    fn default() -> Self {
        Self {
            mtab_path: PathBuf::from("/etc/mtab"),
        }
    }
}

impl SnapMechanism for Btrfs {
    fn verify_volume(&self, ctx: &ExecContext, source: &str) -> bool {
        let fstype = match ctx.probe(&["stat", "-f", "--format=%T", source]) {
            Ok(out) => out,
            Err(_) => {
                warn!("Not btrfs (cannot determine filesystem): {}", source);
                return false;
            }
        };
        if fstype.trim() != "btrfs" {
            warn!("Not btrfs (filesystem not btrfs): {}", source);
            return false;
        }

        let inode = match ctx.probe(&["stat", "--format=%i", source]) {
            Ok(out) => out,
            Err(_) => {
                warn!("Not btrfs (cannot determine inode): {}", source);
                return false;
            }
        };
        if inode.trim() != SUBVOLUME_ROOT_INODE {
            warn!(
                "Not btrfs (inode not 256, possibly a subdirectory of a btrfs mount): {}",
                source
            );
            return false;
        }

        true
    }

    fn create(&self, ctx: &ExecContext, source: &str, destination: &str) -> Result<()> {
        ctx.execute(&["btrfs", "subvolume", "snapshot", "-r", source, destination])
            .inspect_err(|_| error!("Unable to create; are you running as root?"))
    }

    fn delete(&self, ctx: &ExecContext, destination: &str) -> Result<()> {
        ctx.execute(&["btrfs", "subvolume", "delete", destination])
            .inspect_err(|_| error!("Unable to delete; are you running as root?"))
    }

    fn rollback_gen(
        &self,
        ctx: &ExecContext,
        source_dests: &[(String, String)],
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        for (source, _) in source_dests {
            if !self.verify_volume(ctx, source) {
                return Err(Error::Mount(format!(
                    "mount point may no longer be a btrfs volume: {source}"
                )));
            }
        }
        let table = if source_dests.is_empty() {
            MountTable::default()
        } else {
            MountTable::load(&self.mtab_path)?
        };
        rollback::rollback_script(&table, source_dests, now)
    }

    fn sync_paths(&self, ctx: &ExecContext, paths: &BTreeSet<PathBuf>) -> Result<()> {
        for path in paths {
            let path = path.to_string_lossy();
            if !ctx.dry_run() {
                eprintln!("Syncing {} ...", path);
            }
            ctx.execute(&["btrfs", "subvolume", "sync", &path])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use std::sync::Arc;

    fn btrfs_runner(source: &str, fstype: &str, inode: &str) -> ScriptedRunner {
        ScriptedRunner::default()
            .reply(&format!("stat -f --format=%T {source}"), &format!("{fstype}\n"))
            .reply(&format!("stat --format=%i {source}"), &format!("{inode}\n"))
    }

    #[test]
    fn test_verify_volume() {
        let runner = Arc::new(btrfs_runner("/home", "btrfs", "256"));
        let ctx = ExecContext::with_runner(false, runner);
        assert!(Btrfs::default().verify_volume(&ctx, "/home"));

        let runner = Arc::new(btrfs_runner("/home", "ext2/ext3", "2"));
        let ctx = ExecContext::with_runner(false, runner);
        assert!(!Btrfs::default().verify_volume(&ctx, "/home"));

        // Subdirectory of a subvolume
        let runner = Arc::new(btrfs_runner("/home/user", "btrfs", "1234"));
        let ctx = ExecContext::with_runner(false, runner);
        assert!(!Btrfs::default().verify_volume(&ctx, "/home/user"));

        let runner =
            Arc::new(ScriptedRunner::default().fail("stat -f --format=%T /gone", "No such file"));
        let ctx = ExecContext::with_runner(false, runner);
        assert!(!Btrfs::default().verify_volume(&ctx, "/gone"));
    }

    #[test]
    fn test_create_and_delete_commands() {
        let runner = Arc::new(ScriptedRunner::default());
        let ctx = ExecContext::with_runner(false, runner.clone());
        let btrfs = Btrfs::default();

        btrfs.create(&ctx, "/home", "/.snapshots/@home-20230213001000").unwrap();
        btrfs.delete(&ctx, "/.snapshots/@home-20230213001000").unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "btrfs subvolume snapshot -r /home /.snapshots/@home-20230213001000".to_string(),
                "btrfs subvolume delete /.snapshots/@home-20230213001000".to_string(),
            ]
        );
    }

    #[test]
    fn test_create_failure_propagates() {
        let runner = Arc::new(ScriptedRunner::default().fail(
            "btrfs subvolume snapshot -r /home /s/@home-20230213001000",
            "ERROR: cannot snapshot '/home': Operation not permitted",
        ));
        let ctx = ExecContext::with_runner(false, runner);
        let err = Btrfs::default()
            .create(&ctx, "/home", "/s/@home-20230213001000")
            .unwrap_err();
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_sync_paths() {
        let runner = Arc::new(ScriptedRunner::default());
        let ctx = ExecContext::with_runner(false, runner.clone());
        let paths: BTreeSet<PathBuf> = ["/.snapshots", "/home/.snapshots"]
            .iter()
            .map(PathBuf::from)
            .collect();

        Btrfs::default().sync_paths(&ctx, &paths).unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                "btrfs subvolume sync /.snapshots".to_string(),
                "btrfs subvolume sync /home/.snapshots".to_string(),
            ]
        );
    }
}
