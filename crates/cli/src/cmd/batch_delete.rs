//! Delete every snapshot matching a set of filters

use crate::util::{self, Options, Outcome};
use anyhow::Result;
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use sk_core::{Config, ExecContext};
use sk_journal::{SnapOperator, SnapshotFilter, SnapshotRecord, Trigger};
use tracing::info;

/// Filters selected on the command line
pub fn filters(
    indicator: Option<Trigger>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Vec<SnapshotFilter> {
    let mut filters = Vec::new();
    if let Some(trigger) = indicator {
        filters.push(SnapshotFilter::Indicator(trigger));
    }
    if start.is_some() || end.is_some() {
        filters.push(SnapshotFilter::TimeRange { start, end });
    }
    info!("Batch delete filters: {:?}", filters);
    filters
}

pub fn run(
    configs: &[Config],
    failed: usize,
    ctx: &ExecContext,
    opts: &Options,
    now: DateTime<Utc>,
    filters: &[SnapshotFilter],
    yes: bool,
) -> Result<()> {
    let mut outcome = Outcome::new(failed);

    // 1. Select matching snapshots per config
    let mut selected: Vec<(&Config, Vec<SnapshotRecord>)> = Vec::new();
    for config in configs {
        match SnapOperator::new(config, now, ctx).snapshots() {
            Ok(records) => {
                let matching = SnapshotFilter::apply(filters, records);
                if !matching.is_empty() {
                    selected.push((config, matching));
                }
            }
            Err(e) => outcome.record_failure(config, e),
        }
    }

    if selected.is_empty() {
        eprintln!("No snapshots matching the criteria were found.");
        return outcome.finish(ctx, opts);
    }

    // 2. Show them
    println!("{}", "=== THE SNAPSHOTS TO BE DELETED ===".red().bold());
    println!();
    for (config, records) in &selected {
        let operator = SnapOperator::new(config, now, ctx);
        util::print_config_header(config);
        for record in records {
            util::print_row(&operator.list_row(record), false);
        }
        println!();
    }

    // 3. Confirm and delete
    if !yes && !util::confirm("Are you sure you want to delete the above snapshots? [y/N]")? {
        return outcome.finish(ctx, opts);
    }

    for (config, records) in &selected {
        let mut operator = SnapOperator::new(config, now, ctx);
        for record in records {
            if let Err(e) = operator.delete_record(record) {
                outcome.record_failure(config, e);
                break;
            }
        }
        outcome.record_changes(ctx, config, false, operator.snaps_deleted());
    }

    outcome.finish(ctx, opts)
}
