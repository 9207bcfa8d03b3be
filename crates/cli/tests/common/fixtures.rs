//! Test fixtures: a temporary source, destination and config file

use super::cli::SnapCommand;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary rsync-backed setup
pub struct SnapFixture {
    dir: TempDir,
    config_path: PathBuf,
    source: PathBuf,
    dest_prefix: String,
}

impl SnapFixture {
    /// Config with `extra` appended to its `[DEFAULT]` section
    pub fn rsync(extra: &str) -> Result<Self> {
        let dir = TempDir::new()?;
        let source = dir.path().join("src");
        fs::create_dir(&source)?;
        fs::write(source.join("data.txt"), "important")?;
        fs::create_dir(dir.path().join("snaps"))?;

        let dest_prefix = format!("{}/snaps/@src-", dir.path().display());
        let config_path = dir.path().join("src.conf");
        fs::write(
            &config_path,
            format!(
                "[DEFAULT]\nsource = {}\ndest_prefix = {}\nsnap_type = RSYNC\n{}\n",
                source.display(),
                dest_prefix,
                extra
            ),
        )?;

        Ok(Self {
            dir,
            config_path,
            source,
            dest_prefix,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_arg(&self) -> String {
        self.config_path.display().to_string()
    }

    /// Command reading only this fixture's config
    pub fn snapkeep(&self, args: &[&str]) -> SnapCommand {
        let mut cmd = SnapCommand::new(self.path());
        cmd.args(&["--config-file", &self.config_arg()]).args(args);
        cmd
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn dest_prefix(&self) -> &str {
        &self.dest_prefix
    }

    pub fn snapshot_path(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.dest_prefix, suffix))
    }

    pub fn metadata_path(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}{}-meta.json", self.dest_prefix, suffix))
    }

    /// Snapshot directory plus its sidecar file
    pub fn add_snapshot(&self, suffix: &str, metadata: &str) -> Result<()> {
        fs::create_dir(self.snapshot_path(suffix))?;
        fs::write(self.metadata_path(suffix), metadata)?;
        Ok(())
    }

    /// Names in the destination directory, sorted
    pub fn snapshot_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path().join("snaps"))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }
}
