//! Create user snapshots

use crate::util::{self, Options};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sk_core::{Config, ExecContext};

pub fn run(
    configs: &[Config],
    failed: usize,
    ctx: &ExecContext,
    opts: &Options,
    now: DateTime<Utc>,
    comment: Option<String>,
) -> Result<()> {
    util::for_each_source(configs, failed, ctx, now, |op| op.create(comment.clone()))
        .finish(ctx, opts)
}
