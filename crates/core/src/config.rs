//! Per-source configuration
//!
//! Every snapshotted source has its own INI file (usually under
//! [`CONFIG_DIR`]). All keys live in the `[DEFAULT]` section:
//!
//! ```ini
//! [DEFAULT]
//! source = /home
//! dest_prefix = /.snapshots/@home-
//! keep_daily = 5
//! trigger_interval = 1 hour
//! ```

use crate::interval;
use crate::{Error, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info, warn};

/// Where config files are looked up by default
pub const CONFIG_DIR: &str = "/etc/snapkeep/configs";

/// Snapshot backend used by a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SnapType {
    #[default]
    Btrfs,
    Rsync,
    Bcachefs,
}

impl SnapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapType::Btrfs => "BTRFS",
            SnapType::Rsync => "RSYNC",
            SnapType::Bcachefs => "BCACHEFS",
        }
    }
}

impl fmt::Display for SnapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "BTRFS" => Ok(SnapType::Btrfs),
            "RSYNC" => Ok(SnapType::Rsync),
            "BCACHEFS" => Ok(SnapType::Bcachefs),
            other => Err(format!("unknown snap_type {other:?}")),
        }
    }
}

/// Configuration of one snapshotted source
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// File this config was read from
    pub config_file: PathBuf,
    /// Directory (or subvolume) being snapshotted
    pub source: String,
    /// Snapshot paths are `<dest_prefix><YYYYMMDDhhmmss>`
    pub dest_prefix: String,
    /// Grace period before a superfluous scheduled snapshot is removed
    pub min_keep_secs: i64,
    /// User snapshots to keep
    pub keep_user: i64,
    /// Pre-install snapshots to keep
    pub keep_preinstall: i64,
    /// Cooldown between two pre-install snapshots
    pub preinstall_interval: Duration,
    /// Cadence of scheduled snapshots
    pub trigger_interval: Duration,
    /// Assign TTLs to scheduled snapshots at creation
    pub enable_scheduled_ttl: bool,
    pub keep_hourly: u32,
    pub keep_daily: u32,
    pub keep_weekly: u32,
    pub keep_monthly: u32,
    pub keep_yearly: u32,
    /// Executables called with the config path after any change
    pub post_transaction_scripts: Vec<String>,
    pub snap_type: SnapType,
}

impl Config {
    /// A config with default knobs for the given source
    pub fn new(
        config_file: impl Into<PathBuf>,
        source: impl Into<String>,
        dest_prefix: impl Into<String>,
    ) -> Self {
        Self {
            config_file: config_file.into(),
            source: source.into(),
            dest_prefix: dest_prefix.into(),
            min_keep_secs: 30 * 60,
            keep_user: 1,
            keep_preinstall: 1,
            preinstall_interval: Duration::minutes(5),
            trigger_interval: Duration::hours(1),
            enable_scheduled_ttl: true,
            keep_hourly: 0,
            keep_daily: 5,
            keep_weekly: 0,
            keep_monthly: 0,
            keep_yearly: 0,
            post_transaction_scripts: Vec::new(),
            snap_type: SnapType::Btrfs,
        }
    }

    /// Load a config file from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_ini(path, &text)
    }

    /// Parse INI text; `path` is recorded as the config's origin
    pub fn from_ini(path: &Path, text: &str) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Ini))
            .build()
            .map_err(|e| Error::config(path, e.to_string()))?;
        let section = default_section(raw).map_err(|e| Error::config(path, e.to_string()))?;

        let mut result = Self::new(path, "", "");

        // Deterministic order for warnings
        let mut keys: Vec<_> = section.keys().cloned().collect();
        keys.sort();

        for key in keys {
            let value = section[&key].trim();
            let bad = |what: &str| Error::config(path, format!("{key} = {value:?}: {what}"));
            let interval = || parse_interval(value).map_err(|_| bad("invalid interval"));
            let integer = || value.parse::<i64>().map_err(|_| bad("expected an integer"));
            let count = || value.parse::<u32>().map_err(|_| bad("expected a count"));

            match key.as_str() {
                "source" => result.source = value.to_string(),
                "dest_prefix" => result.dest_prefix = value.to_string(),
                "post_transaction_scripts" => {
                    result.post_transaction_scripts =
                        value.split_whitespace().map(str::to_string).collect();
                }
                "snap_type" => result.snap_type = value.parse().map_err(|e: String| bad(&e))?,
                "enable_scheduled_ttl" => {
                    result.enable_scheduled_ttl = match value.to_ascii_lowercase().as_str() {
                        "true" => true,
                        "false" => false,
                        _ => return Err(bad("expected true or false")),
                    };
                }
                "preinstall_interval" => result.preinstall_interval = interval()?,
                "trigger_interval" => {
                    let interval = interval()?;
                    if interval <= Duration::zero() {
                        return Err(bad("must be at least one second"));
                    }
                    result.trigger_interval = interval;
                }
                "min_keep_secs" => result.min_keep_secs = integer()?,
                "keep_user" => result.keep_user = integer()?,
                "keep_preinstall" => result.keep_preinstall = integer()?,
                "keep_hourly" => result.keep_hourly = count()?,
                "keep_daily" => result.keep_daily = count()?,
                "keep_weekly" => result.keep_weekly = count()?,
                "keep_monthly" => result.keep_monthly = count()?,
                "keep_yearly" => result.keep_yearly = count()?,
                _ => warn!("Invalid field {:?} found in {}", key, path.display()),
            }
        }

        Ok(result)
    }

    /// Both `source` and `dest_prefix` are set
    pub fn is_valid(&self) -> bool {
        !self.source.is_empty() && !self.dest_prefix.is_empty()
    }

    /// Any periodic retention tier is active
    pub fn is_schedule_enabled(&self) -> bool {
        self.keep_hourly > 0
            || self.keep_daily > 0
            || self.keep_weekly > 0
            || self.keep_monthly > 0
            || self.keep_yearly > 0
    }

    /// Directory holding the snapshots
    pub fn mount_path(&self) -> PathBuf {
        match self.dest_prefix.rfind('/') {
            Some(0) => PathBuf::from("/"),
            Some(i) => PathBuf::from(&self.dest_prefix[..i]),
            None => PathBuf::from("."),
        }
    }

    /// File name prefix shared by all snapshots, e.g. `@home-`
    pub fn name_prefix(&self) -> &str {
        match self.dest_prefix.rfind('/') {
            Some(i) => &self.dest_prefix[i + 1..],
            None => &self.dest_prefix,
        }
    }
}

fn parse_interval(text: &str) -> Result<Duration> {
    interval::parse_duration(text)
}

/// Extract the `[DEFAULT]` section, or the top level of a headerless file
fn default_section(
    raw: config::Config,
) -> std::result::Result<HashMap<String, String>, config::ConfigError> {
    for name in ["DEFAULT", "default"] {
        if let Ok(table) = raw.get_table(name) {
            return table
                .into_iter()
                .map(|(k, v)| v.into_string().map(|s| (k, s)))
                .collect();
        }
    }

    let top: HashMap<String, config::Value> = raw.try_deserialize()?;
    Ok(top
        .into_iter()
        .filter_map(|(k, v)| v.into_string().ok().map(|s| (k, s)))
        .collect())
}

/// Load all configs that should be processed.
///
/// `config_file` overrides the directory scan. Configs without `source` or
/// `dest_prefix` are skipped; with `source` given only matching configs are
/// returned. A file that fails to parse is returned as an error so the caller
/// can keep going with the others.
pub fn iterate_configs(
    config_file: Option<&Path>,
    config_dir: &Path,
    source: Option<&str>,
) -> Vec<Result<Config>> {
    let files: Vec<PathBuf> = match config_file {
        Some(file) => {
            if !file.is_file() {
                warn!("Could not find specified config file: {}", file.display());
                return Vec::new();
            }
            info!("Using user-supplied config {}", file.display());
            vec![file.to_path_buf()]
        }
        None => {
            if !config_dir.is_dir() {
                eprintln!(
                    "Config directory does not exist. Use 'create-config' command to create a config."
                );
                return Vec::new();
            }
            let entries = match fs::read_dir(config_dir) {
                Ok(entries) => entries,
                Err(e) => {
                    error!("Cannot access '{}'; run as root? ({})", config_dir.display(), e);
                    return Vec::new();
                }
            };
            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "conf"))
                .collect();
            files.sort();
            files
        }
    };

    let mut found = false;
    let mut result = Vec::new();
    for file in files {
        info!("Reading config {}", file.display());
        let config = match Config::from_file(&file) {
            Ok(config) => config,
            Err(e) => {
                result.push(Err(e));
                continue;
            }
        };
        if !config.is_valid() {
            eprintln!(
                "WARNING: Skipping invalid configuration {} (please specify source and dest_prefix)",
                file.display()
            );
            continue;
        }
        if source.map_or(true, |s| config.source == s) {
            found = true;
            result.push(Ok(config));
        }
    }

    if let Some(source) = source {
        if !found {
            warn!("No config file found with source={}", source);
        }
    }

    result
}
