//! Retention enforcement.
//!
//! The reaper destroys expired records on a fixed cadence and accounts for
//! every destruction. Worst-case exposure of an expired record is one
//! sweep interval past its expiry — and reads refuse expired records even
//! inside that window (see [`crate::store::RecordStore::get`]).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::store::RecordStore;

/// Periodic destroyer of expired records.
pub struct RetentionReaper {
    purge_operations: AtomicU64,
}

impl RetentionReaper {
    pub fn new() -> Self {
        Self {
            purge_operations: AtomicU64::new(0),
        }
    }

    /// One sweep: destroy everything at or past its expiry.
    ///
    /// Holds the store's write lock only for the sweep itself; never blocks
    /// foreground calls for longer than one pass over the records.
    pub fn tick(&self, store: &RecordStore, now_ms: u64) -> usize {
        let purged = store.purge_expired(now_ms);
        if purged > 0 {
            self.purge_operations
                .fetch_add(purged as u64, Ordering::Relaxed);
            tracing::debug!(purged, "retention sweep destroyed expired records");
        }
        purged
    }

    /// Destroy all records unconditionally. Used by the emergency purge;
    /// idempotent and safe to race with [`RetentionReaper::tick`].
    pub fn purge_all(&self, store: &RecordStore) -> usize {
        let purged = store.purge_all();
        if purged > 0 {
            self.purge_operations
                .fetch_add(purged as u64, Ordering::Relaxed);
        }
        purged
    }

    /// Total records destroyed over this reaper's lifetime.
    pub fn purge_operations(&self) -> u64 {
        self.purge_operations.load(Ordering::Relaxed)
    }
}

impl Default for RetentionReaper {
    fn default() -> Self {
        Self::new()
    }
}
