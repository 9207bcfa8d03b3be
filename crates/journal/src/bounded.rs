//! Count-bounded retention for user and install-hook snapshots

use sk_core::{Error, Result};

/// Everything except the last `k` items
pub fn all_but_last_k<T>(items: &[T], k: i64) -> Result<&[T]> {
    if k < 0 {
        return Err(Error::NegativeKeep(k));
    }
    let keep = usize::try_from(k).unwrap_or(usize::MAX);
    Ok(&items[..items.len().saturating_sub(keep)])
}

/// What to do to end up with at most `count` snapshots, one of them new
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedPlan<T> {
    pub create: bool,
    pub delete: Vec<T>,
}

/// Plan for `existing` snapshots (oldest first) bounded by `count`.
///
/// A positive count creates one snapshot and keeps the newest `count - 1`
/// of the existing ones; zero or less creates nothing and removes all.
pub fn maintain<T: Clone>(count: i64, existing: &[T]) -> Result<BoundedPlan<T>> {
    if count > 0 {
        Ok(BoundedPlan {
            create: true,
            delete: all_but_last_k(existing, count - 1)?.to_vec(),
        })
    } else {
        Ok(BoundedPlan {
            create: false,
            delete: existing.to_vec(),
        })
    }
}
