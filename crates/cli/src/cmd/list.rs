//! List managed snapshots

use crate::util::{self, Outcome};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sk_core::{Config, ExecContext};
use sk_journal::SnapOperator;

pub fn run(
    configs: &[Config],
    failed: usize,
    ctx: &ExecContext,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut outcome = Outcome::new(failed);
    for config in configs {
        let operator = SnapOperator::new(config, now, ctx);
        util::print_config_header(config);
        match operator.list_rows() {
            Ok(rows) => rows.iter().for_each(|row| util::print_row(row, true)),
            Err(e) => outcome.record_failure(config, e),
        }
        println!();
    }
    outcome.finish(ctx, &util::Options::default())
}

pub fn run_json(
    configs: &[Config],
    failed: usize,
    ctx: &ExecContext,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut outcome = Outcome::new(failed);
    for config in configs {
        match SnapOperator::new(config, now, ctx).list_json() {
            Ok(lines) => lines.iter().for_each(|line| println!("{line}")),
            Err(e) => outcome.record_failure(config, e),
        }
    }
    outcome.finish(ctx, &util::Options::default())
}
