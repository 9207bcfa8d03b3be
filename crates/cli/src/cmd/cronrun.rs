//! Entry points for the timer and the package manager hook

use crate::util::{self, Options};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sk_core::{Config, ExecContext};
use tracing::warn;

pub fn run(
    configs: &[Config],
    failed: usize,
    ctx: &ExecContext,
    opts: &Options,
    now: DateTime<Utc>,
) -> Result<()> {
    util::for_each_source(configs, failed, ctx, now, |op| op.scheduled()).finish(ctx, opts)
}

pub fn run_preupdate(
    configs: &[Config],
    failed: usize,
    ctx: &ExecContext,
    opts: &Options,
    now: DateTime<Utc>,
) -> Result<()> {
    // The snapshot is still taken without a comment
    let comment = match util::last_pacman_command(ctx) {
        Ok(command) => Some(command),
        Err(e) => {
            warn!("{:#}", e);
            None
        }
    };
    util::for_each_source(configs, failed, ctx, now, |op| op.on_install_hook(comment.clone()))
        .finish(ctx, opts)
}
