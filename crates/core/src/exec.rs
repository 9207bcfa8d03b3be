//! Execution context threaded through every component that touches the system
//!
//! Read-only probes (`stat`, `which`, ...) always run. Anything that creates
//! or removes state goes through [`ExecContext::execute`] and friends, which
//! print the intended action instead when dry-run is enabled.

use crate::{Error, Result};
use std::fmt;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

/// Runs an external command and returns its stdout
pub trait CommandRunner: Send + Sync {
    fn run(&self, argv: &[&str]) -> Result<String>;
}

/// Runs commands with `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[&str]) -> Result<String> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Unsupported("empty command".to_string()))?;

        debug!("Running {}", argv.join(" "));
        let output = Command::new(program).args(args).output()?;

        if !output.status.success() {
            return Err(Error::Command {
                command: argv.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Dry-run flag plus the runner used for external commands
#[derive(Clone)]
pub struct ExecContext {
    dry_run: bool,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecContext")
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl ExecContext {
    /// Context backed by the real system
    pub fn new(dry_run: bool) -> Self {
        Self::with_runner(dry_run, Arc::new(SystemRunner))
    }

    /// Context with a custom runner
    pub fn with_runner(dry_run: bool, runner: Arc<dyn CommandRunner>) -> Self {
        Self { dry_run, runner }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run a command that does not change anything, even under dry-run
    pub fn probe(&self, argv: &[&str]) -> Result<String> {
        self.runner.run(argv)
    }

    /// Run a command that changes system state
    pub fn execute(&self, argv: &[&str]) -> Result<()> {
        if self.dry_run {
            eprintln!("Would run {}", argv.join(" "));
            return Ok(());
        }
        self.runner.run(argv).map(|_| ())
    }

    /// Write a file, or describe the write under dry-run
    pub fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        if self.dry_run {
            eprintln!("Would create {}: {}", path.display(), contents);
            return Ok(());
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Remove a file if it exists, or describe the removal under dry-run
    pub fn remove_file(&self, path: &Path) -> Result<()> {
        if self.dry_run {
            eprintln!("Would delete {}", path.display());
            return Ok(());
        }
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
