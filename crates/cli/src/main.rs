//! Snapkeep CLI - snapkeep command

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sk_core::{timestamp, ExecContext};
use sk_journal::Trigger;
use std::path::PathBuf;
use tracing::Level;

mod cmd;
mod util;

/// Snapkeep - Scheduled and on-demand filesystem snapshots
#[derive(Parser)]
#[command(name = "snapkeep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Wait for btrfs to sync for any delete operations
    #[arg(long, global = true)]
    sync: bool,

    /// Use this config file instead of the config directory
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// Restrict to configs with this source path
    #[arg(long, global = true)]
    source: Option<String>,

    /// Show what would be done without creating or deleting anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Log at INFO level
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap a config for a new filesystem to snapshot
    CreateConfig {
        /// Name of the config file, e.g. "home"
        name: String,
    },
    /// List all managed snapshots
    List,
    /// Machine readable list of all managed snapshots
    ListJson,
    /// Create new snapshots
    Create {
        /// Comment attached to this snapshot
        #[arg(long)]
        comment: Option<String>,
    },
    /// Set a TTL for matching snapshots
    SetTtl {
        /// Time to live from now, e.g. '1 day' or '20 years'. Empty '' removes the TTL
        #[arg(long, allow_hyphen_values = true)]
        ttl: String,
        /// Timestamp suffix or full path of a snapshot
        target: String,
    },
    /// Delete matching snapshots
    Delete {
        /// Timestamp suffix or full path of a snapshot
        target: String,
    },
    /// Delete all snapshots matching the filters
    BatchDelete {
        /// Only snapshots with this trigger (S, I or U)
        #[arg(long, value_parser = parse_indicator)]
        indicator: Option<Trigger>,
        /// Only snapshots taken at or after this time, 'YYYY-MM-DD HH:MM[:SS]'
        #[arg(long, value_parser = parse_time)]
        start: Option<DateTime<Utc>>,
        /// Only snapshots taken before this time, 'YYYY-MM-DD HH:MM[:SS]'
        #[arg(long, value_parser = parse_time)]
        end: Option<DateTime<Utc>>,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Generate a script to roll back to a snapshot
    RollbackGen {
        /// Run the generated script after confirmation
        #[arg(long)]
        execute: bool,
        /// Timestamp suffix or full path of a snapshot
        target: String,
    },
    /// Generate a rollback script and run it
    Rollback {
        /// Run the script without confirmation
        #[arg(long)]
        noconfirm: bool,
        /// Timestamp suffix or full path of a snapshot
        target: String,
    },
    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Called hourly by snapkeep.timer
    #[command(hide = true)]
    InternalCronrun,
    /// Called by the package manager hook before installs and updates
    #[command(hide = true)]
    InternalPreupdate,
}

fn parse_indicator(text: &str) -> std::result::Result<Trigger, String> {
    Trigger::from_indicator(text).ok_or_else(|| format!("expected S, I or U, got {text:?}"))
}

fn parse_time(text: &str) -> std::result::Result<DateTime<Utc>, String> {
    timestamp::parse_user_time(text).map_err(|e| e.to_string())
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::INFO } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        eprintln!("Start with --help to see common args.");
        return Ok(());
    };

    init_logging(cli.verbose);

    let opts = util::Options {
        config_file: cli.config_file,
        source: cli.source,
        dry_run: cli.dry_run,
        sync: cli.sync,
    };
    let ctx = ExecContext::new(opts.dry_run);

    // Commands that do not operate on existing configs
    match &command {
        Commands::Completions { shell } => return cmd::completions::run(*shell),
        Commands::CreateConfig { name } => {
            return cmd::create_config::run(
                name,
                opts.source.as_deref(),
                opts.config_file.as_deref(),
            )
        }
        _ => {}
    }

    // Single timestamp for all operations
    let now = Utc::now();
    let (configs, failed) = util::load_configs(&opts);
    util::timer_notice(&ctx, &opts, &configs);

    match command {
        Commands::List => cmd::list::run(&configs, failed, &ctx, now),
        Commands::ListJson => cmd::list::run_json(&configs, failed, &ctx, now),
        Commands::Create { comment } => {
            cmd::create::run(&configs, failed, &ctx, &opts, now, comment)
        }
        Commands::SetTtl { ttl, target } => {
            cmd::set_ttl::run(&configs, failed, &ctx, now, &target, &ttl)
        }
        Commands::Delete { target } => {
            cmd::delete::run(&configs, failed, &ctx, &opts, now, &target)
        }
        Commands::BatchDelete {
            indicator,
            start,
            end,
            yes,
        } => {
            let filters = cmd::batch_delete::filters(indicator, start, end);
            cmd::batch_delete::run(&configs, failed, &ctx, &opts, now, &filters, yes)
        }
        Commands::RollbackGen { execute, target } => {
            cmd::rollback::run(&configs, &ctx, now, &target, execute, false)
        }
        Commands::Rollback { noconfirm, target } => {
            cmd::rollback::run(&configs, &ctx, now, &target, true, noconfirm)
        }
        Commands::InternalCronrun => cmd::cronrun::run(&configs, failed, &ctx, &opts, now),
        Commands::InternalPreupdate => {
            cmd::cronrun::run_preupdate(&configs, failed, &ctx, &opts, now)
        }
        Commands::Completions { .. } | Commands::CreateConfig { .. } => Ok(()),
    }
}
