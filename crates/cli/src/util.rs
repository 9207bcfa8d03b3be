//! Shared utilities for CLI commands

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use regex::Regex;
use sk_backend::{Mechanism, SnapMechanism};
use sk_core::config::{iterate_configs, CONFIG_DIR};
use sk_core::{Config, ExecContext, SnapType};
use sk_journal::{ListRow, SnapOperator};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{error, info, warn};

const DEFAULT_PACMAN_LOG: &str = "/var/log/pacman.log";
const TIMER_UNIT: &str = "snapkeep.timer";

#[allow(clippy::expect_used)]
static PACMAN_RUNNING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[\d\-:T+]*\] \[PACMAN\] Running '(?P<cmd>.*)'")
        .expect("constant regex pattern is valid")
});

/// Global flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub config_file: Option<PathBuf>,
    pub source: Option<String>,
    pub dry_run: bool,
    pub sync: bool,
}

/// Configs selected by the global flags, plus how many failed to load
pub fn load_configs(opts: &Options) -> (Vec<Config>, usize) {
    let mut configs = Vec::new();
    let mut failed = 0;
    for result in iterate_configs(
        opts.config_file.as_deref(),
        Path::new(CONFIG_DIR),
        opts.source.as_deref(),
    ) {
        match result {
            Ok(config) => configs.push(config),
            Err(e) => {
                error!("{}", e);
                failed += 1;
            }
        }
    }
    (configs, failed)
}

/// Per-source results of one invocation
#[derive(Debug, Default)]
pub struct Outcome {
    sync_paths: BTreeSet<PathBuf>,
    failures: usize,
}

impl Outcome {
    pub fn new(failures: usize) -> Self {
        Self {
            sync_paths: BTreeSet::new(),
            failures,
        }
    }

    pub fn record_failure(&mut self, config: &Config, err: impl Display) {
        error!("{}: {}", config.config_file.display(), err);
        self.failures += 1;
    }

    /// Queue a sync for deletions and run the config's post hooks on changes
    pub fn record_changes(
        &mut self,
        ctx: &ExecContext,
        config: &Config,
        created: bool,
        deleted: bool,
    ) {
        if deleted && config.snap_type == SnapType::Btrfs {
            self.sync_paths.insert(config.mount_path());
        }
        if created || deleted {
            call_post_hooks(ctx, config);
        }
    }

    /// Sync if requested; fails if any source failed
    pub fn finish(self, ctx: &ExecContext, opts: &Options) -> Result<()> {
        if opts.sync && !self.sync_paths.is_empty() {
            Mechanism::for_type(SnapType::Btrfs)
                .sync_paths(ctx, &self.sync_paths)
                .context("Failed to sync deleted snapshots")?;
        }
        if self.failures > 0 {
            anyhow::bail!("{} config(s) failed", self.failures);
        }
        Ok(())
    }
}

/// Run `op` on every config, isolating failures per source
pub fn for_each_source<F>(
    configs: &[Config],
    failed: usize,
    ctx: &ExecContext,
    now: DateTime<Utc>,
    mut op: F,
) -> Outcome
where
    F: FnMut(&mut SnapOperator<'_>) -> sk_core::Result<()>,
{
    let mut outcome = Outcome::new(failed);
    for config in configs {
        let mut operator = SnapOperator::new(config, now, ctx);
        if let Err(e) = op(&mut operator) {
            outcome.record_failure(config, e);
        }
        outcome.record_changes(ctx, config, operator.snaps_created(), operator.snaps_deleted());
    }
    outcome
}

/// Each script is called with the config file as its only argument
pub fn call_post_hooks(ctx: &ExecContext, config: &Config) {
    let config_file = config.config_file.to_string_lossy().into_owned();
    for script in &config.post_transaction_scripts {
        if let Err(e) = ctx.execute(&[script.as_str(), config_file.as_str()]) {
            warn!("User script {} with {} resulted in error: {}", script, config_file, e);
        }
    }
}

/// Ask on stdout, read the answer from stdin
pub fn confirm(message: &str) -> Result<bool> {
    print!("{message} ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    match answer.trim() {
        "y" | "Y" | "yes" | "Yes" | "YES" => Ok(true),
        _ => {
            println!("Aborted.");
            Ok(false)
        }
    }
}

fn pacman_log_path(ctx: &ExecContext) -> PathBuf {
    match ctx.probe(&["pacman-conf", "LogFile"]) {
        Ok(out) if !out.trim().is_empty() => PathBuf::from(out.trim()),
        _ => {
            warn!("Unable to determine pacman log path. Using default.");
            PathBuf::from(DEFAULT_PACMAN_LOG)
        }
    }
}

/// Last command pacman logged as running
pub fn last_pacman_command(ctx: &ExecContext) -> Result<String> {
    let path = pacman_log_path(ctx);
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    find_last_pacman_command(&text).ok_or_else(|| anyhow!("Last pacman command not found"))
}

fn find_last_pacman_command(log: &str) -> Option<String> {
    log.lines()
        .rev()
        .find_map(|line| PACMAN_RUNNING.captures(line))
        .map(|caps| caps["cmd"].to_string())
}

/// Remind the user to enable the timer if any config has a schedule
pub fn timer_notice(ctx: &ExecContext, opts: &Options, configs: &[Config]) {
    if opts.config_file.is_some() || !configs.iter().any(Config::is_schedule_enabled) {
        return;
    }
    if ctx.probe(&["systemctl", "is-active", TIMER_UNIT]).is_ok() {
        info!("{} is active", TIMER_UNIT);
        return;
    }
    eprintln!();
    eprintln!(
        "{}",
        format!("*** NOTE - Backup schedule exists but {TIMER_UNIT} is not active ***").yellow()
    );
    eprintln!("To enable scheduled backups, please run -");
    eprintln!("  sudo systemctl enable --now {TIMER_UNIT}");
    eprintln!();
}

/// `Config: ...` and `Snaps at: ...` lines above a listing
pub fn print_config_header(config: &Config) {
    println!(
        "Config: {} (source={})",
        config.config_file.display().bold(),
        config.source
    );
    println!("Snaps at: {}...", config.dest_prefix.cyan());
}

pub fn print_row(row: &ListRow, show_ttl: bool) {
    let age = format!("{:<20}", row.age);
    let mut columns = vec![
        format!("  {}", row.suffix.yellow()),
        row.indicator.green().to_string(),
        age.dimmed().to_string(),
    ];
    if show_ttl {
        let ttl = row.ttl.as_ref().map(|t| format!("TTL: {t}")).unwrap_or_default();
        columns.push(format!("{ttl:<18}"));
    }
    columns.push(row.comment.clone());
    println!("{}", columns.join("  "));
}
