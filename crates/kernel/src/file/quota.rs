//! Per-property serialization of quota check and write.
//!
//! Counting the directory and then writing is a check-then-act sequence.
//! Holding the property's lock across both closes that window for every
//! request served by this process. Deployments with several writers on
//! shared storage need a shared conditional counter instead.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::file::property::PropertyId;

/// Lazily created async mutex per property.
#[derive(Default)]
pub struct QuotaLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl QuotaLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive quota access to `property`.
    pub async fn acquire(&self, property: &PropertyId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(property.as_str().to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drop lock entries nobody holds or waits on.
    pub fn release_idle(&self) {
        // Entry cloning happens under the shard lock, so a count of one here
        // means no guard or waiter exists.
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of properties with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl std::fmt::Debug for QuotaLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaLocks")
            .field("entries", &self.locks.len())
            .finish()
    }
}
