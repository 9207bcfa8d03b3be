//! Plain directory copies with rsync, for filesystems without snapshots

use crate::SnapMechanism;
use chrono::{DateTime, Utc};
use sk_core::{Error, ExecContext, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct Rsync;

impl SnapMechanism for Rsync {
    fn verify_volume(&self, _ctx: &ExecContext, source: &str) -> bool {
        let path = Path::new(source);
        if !path.exists() {
            warn!("Source path does not exist: {}", source);
            return false;
        }
        let readable = if path.is_dir() {
            fs::read_dir(path).is_ok()
        } else {
            fs::File::open(path).is_ok()
        };
        if !readable {
            warn!("Source path is not readable: {}", source);
            return false;
        }
        true
    }

    fn create(&self, ctx: &ExecContext, source: &str, destination: &str) -> Result<()> {
        let source = format!("{}/", source.trim_end_matches('/'));
        ctx.execute(&["rsync", "-aAXHSv", "--delete", &source, destination])
            .inspect_err(|_| error!("Unable to create snapshot using rsync."))
    }

    fn delete(&self, ctx: &ExecContext, destination: &str) -> Result<()> {
        ctx.execute(&["rm", "-rf", destination])
            .inspect_err(|_| error!("Unable to delete snapshot."))
    }

    fn rollback_gen(
        &self,
        _ctx: &ExecContext,
        _source_dests: &[(String, String)],
        _now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        Err(Error::Unsupported("rollback of rsync snapshots".to_string()))
    }

    fn sync_paths(&self, _ctx: &ExecContext, _paths: &BTreeSet<PathBuf>) -> Result<()> {
        info!("sync_paths is a no-op for rsync snapshots.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_verify_volume() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ExecContext::new(false);
        let source = temp_dir.path().to_string_lossy().into_owned();

        assert!(Rsync.verify_volume(&ctx, &source));
        assert!(!Rsync.verify_volume(&ctx, &format!("{source}/missing")));
    }

    #[test]
    fn test_commands() {
        let runner = Arc::new(ScriptedRunner::default());
        let ctx = ExecContext::with_runner(false, runner.clone());

        Rsync.create(&ctx, "/data/", "/backup/@data-20230213001000").unwrap();
        Rsync.delete(&ctx, "/backup/@data-20230213001000").unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "rsync -aAXHSv --delete /data/ /backup/@data-20230213001000".to_string(),
                "rm -rf /backup/@data-20230213001000".to_string(),
            ]
        );
    }

    #[test]
    fn test_rollback_unsupported() {
        let ctx = ExecContext::new(true);
        let pairs = vec![("/data".to_string(), "/backup/@data-20230213001000".to_string())];
        let err = Rsync.rollback_gen(&ctx, &pairs, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
