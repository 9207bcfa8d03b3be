//! Core primitives shared by the snapkeep crates
//!
//! This crate provides:
//! - The shared error type
//! - Snapshot identity timestamps (`YYYYMMDDhhmmss` suffixes)
//! - Human readable intervals ("1 hour", "30m")
//! - Per-source configuration and INI loading
//! - The execution context (dry-run flag + command runner)

pub mod config;
pub mod error;
pub mod exec;
pub mod interval;
pub mod timestamp;

// Re-exports
pub use config::{Config, SnapType};
pub use error::{Error, Result};
pub use exec::{CommandRunner, ExecContext, SystemRunner};
pub use timestamp::{duration_buffer, DURATION_BUFFER_SECS};
