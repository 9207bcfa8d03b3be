//! CLI command implementations

pub mod batch_delete;
pub mod completions;
pub mod create;
pub mod create_config;
pub mod cronrun;
pub mod delete;
pub mod list;
pub mod rollback;
pub mod set_ttl;
