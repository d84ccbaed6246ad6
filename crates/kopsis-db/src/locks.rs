//! # Keyed Locks
//!
//! In-process serialization of ledger writes per entity.
//!
//! ```text
//!   pay(L1) ──┐                      ┌── pay(L2)
//!             ▼                      ▼
//!   "liability:L1" mutex     "liability:L2" mutex     ← independent
//!             │
//!   cancel(P on L1) waits here until pay(L1) commits
//! ```
//!
//! SQLite already serializes writers; these locks make the read-check-write
//! of `paid_amount` and the "already billed?" check of generation happen
//! without another request slipping in between. The guarded UPDATEs in the
//! repositories catch anything that bypasses this process.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle entries are pruned once the map grows past this size.
const PRUNE_THRESHOLD: usize = 4096;

/// One async mutex per key, created on first use.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        KeyedLocks {
            locks: DashMap::new(),
        }
    }

    /// Waits for the lock of `key`. Held until the guard is dropped.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        if self.locks.len() > PRUNE_THRESHOLD {
            self.prune();
        }

        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        mutex.lock_owned().await
    }

    /// Locks several keys in sorted order so two callers with overlapping
    /// key sets cannot deadlock.
    pub async fn lock_many<I, S>(&self, keys: I) -> Vec<OwnedMutexGuard<()>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Drops entries nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub fn liability_key(id: &str) -> String {
    format!("liability:{}", id)
}

pub fn template_key(id: &str) -> String {
    format!("template:{}", id)
}
