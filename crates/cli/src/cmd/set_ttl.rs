//! Set or clear the TTL of a snapshot

use crate::util::Outcome;
use anyhow::Result;
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use sk_core::{Config, ExecContext};
use sk_journal::SnapOperator;

pub fn run(
    configs: &[Config],
    failed: usize,
    ctx: &ExecContext,
    now: DateTime<Utc>,
    target: &str,
    ttl: &str,
) -> Result<()> {
    let mut outcome = Outcome::new(failed);
    let mut found = false;

    for config in configs {
        match SnapOperator::new(config, now, ctx).set_ttl(target, ttl) {
            Ok(matched) => found |= matched,
            Err(e) => outcome.record_failure(config, e),
        }
    }

    if !found {
        eprintln!("Target {} not found in any config.", target.yellow());
    }
    outcome.finish(ctx, &Default::default())
}
