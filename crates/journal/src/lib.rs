//! Snapshot records and the retention engine
//!
//! This crate provides:
//! - Snapshot records and their JSON sidecar metadata
//! - Destination scanning (`Journal`)
//! - Time-bucketed deletion, TTL assignment, bounded-count retention
//! - The trigger gate for periodic runs
//! - `SnapOperator`, which combines all of the above per configured source
//! - Filters for batch deletion

pub mod batch;
pub mod bounded;
pub mod gate;
pub mod journal;
pub mod metadata;
pub mod operator;
pub mod retention;
pub mod snapshot;
pub mod ttl;

// Re-exports
pub use batch::SnapshotFilter;
pub use journal::Journal;
pub use metadata::{Metadata, Trigger};
pub use operator::{ListRow, SnapOperator};
pub use retention::{BucketDeletion, RetentionPolicy, RetentionRule};
pub use snapshot::SnapshotRecord;
pub use ttl::TtlAssignment;
