//! Delete a single snapshot

use crate::util::{Options, Outcome};
use anyhow::Result;
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use sk_core::{Config, ExecContext};
use sk_journal::SnapOperator;

pub fn run(
    configs: &[Config],
    failed: usize,
    ctx: &ExecContext,
    opts: &Options,
    now: DateTime<Utc>,
    target: &str,
) -> Result<()> {
    let mut outcome = Outcome::new(failed);
    let mut found = false;

    for config in configs {
        let mut operator = SnapOperator::new(config, now, ctx);
        match operator.delete_target(target) {
            Ok(matched) => found |= matched,
            Err(e) => outcome.record_failure(config, e),
        }
        outcome.record_changes(ctx, config, false, operator.snaps_deleted());
    }

    if !found {
        eprintln!("Target {} not found in any config.", target.yellow());
    }
    outcome.finish(ctx, opts)
}
