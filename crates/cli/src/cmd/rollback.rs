//! Generate, and optionally run, a rollback script

use crate::util;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use nix::unistd::Uid;
use owo_colors::OwoColorize;
use sk_backend::{Mechanism, SnapMechanism};
use sk_core::{Config, ExecContext, SnapType};
use sk_journal::SnapOperator;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{info, warn};

const ROLLBACK_SCRIPT: &str = "/tmp/rollback.sh";

/// `(source, snapshot)` pairs matching `target`, grouped by backend
fn find_and_group(
    configs: &[Config],
    ctx: &ExecContext,
    now: DateTime<Utc>,
    target: &str,
) -> Result<Vec<(SnapType, Vec<(String, String)>)>> {
    let mut groups: Vec<(SnapType, Vec<(String, String)>)> = Vec::new();
    for config in configs {
        let operator = SnapOperator::new(config, now, ctx);
        let Some(record) = operator.find_target(target)? else {
            continue;
        };
        let pair = (record.metadata.source.clone(), record.target().to_string());
        match groups.iter_mut().find(|(t, _)| *t == config.snap_type) {
            Some((_, pairs)) => pairs.push(pair),
            None => groups.push((config.snap_type, vec![pair])),
        }
    }
    groups.sort_by_key(|(t, _)| t.as_str());
    Ok(groups)
}

pub fn run(
    configs: &[Config],
    ctx: &ExecContext,
    now: DateTime<Utc>,
    target: &str,
    execute: bool,
    no_confirm: bool,
) -> Result<()> {
    // 1. Generate
    let groups = find_and_group(configs, ctx, now, target)?;
    let mut contents = Vec::new();
    if groups.is_empty() {
        contents.push(sk_backend::rollback::NO_MATCH.to_string());
    }
    for (snap_type, pairs) in &groups {
        let lines = Mechanism::for_type(*snap_type)
            .rollback_gen(ctx, pairs, now)
            .with_context(|| format!("Failed to generate {snap_type} rollback"))?;
        contents.push(lines.join("\n"));
    }

    println!("{}", "=== THE FOLLOWING IS THE ROLLBACK CODE ===".bold());
    for content in &contents {
        println!("{content}");
    }
    println!("{}", "=== THE ABOVE IS THE ROLLBACK CODE ===".bold());

    // 2. Save
    write_script(Path::new(ROLLBACK_SCRIPT), &contents)?;

    // 3. Run
    if !execute {
        return Ok(());
    }
    if !Uid::effective().is_root() {
        warn!("Rollback usually needs root privileges");
    }
    if no_confirm || util::confirm("Review the code and enter 'y' to confirm execution. [y/N]")? {
        ctx.execute(&["bash", ROLLBACK_SCRIPT])
            .context("Rollback script failed")?;
    }
    Ok(())
}

fn write_script(path: &Path, contents: &[String]) -> Result<()> {
    let mut text = contents.join("\n");
    text.push('\n');
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("The rollback script is saved in {}", path.display());

    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("Failed to make {} executable", path.display()))?;
    Ok(())
}
