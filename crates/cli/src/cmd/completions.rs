//! Print a shell completion script

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell};

pub fn run(shell: Shell) -> Result<()> {
    let mut command = crate::Cli::command();
    generate(shell, &mut command, "snapkeep", &mut std::io::stdout());
    Ok(())
}
