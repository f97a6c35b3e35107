//! In-memory resource lock table.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use sitehub_core::types::id::UserId;

/// One held resource lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    /// The locked resource path.
    pub resource: String,
    /// The user holding the lock.
    pub owner: UserId,
    /// When the lock was acquired.
    pub acquired: DateTime<Utc>,
}

/// Concurrent map of resource path → lock, mutated by request threads and
/// flushed to durable storage by the reaper.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: DashMap<String, LockEntry>,
}

impl LockTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a lock on `resource` for `owner`.
    ///
    /// Returns `false` when another user already holds it; re-locking an
    /// already-owned resource succeeds.
    pub fn lock(&self, resource: &str, owner: UserId) -> bool {
        let entry = self
            .locks
            .entry(resource.to_string())
            .or_insert_with(|| LockEntry {
                resource: resource.to_string(),
                owner,
                acquired: Utc::now(),
            });
        entry.owner == owner
    }

    /// Releases the lock on `resource`, returning it.
    pub fn unlock(&self, resource: &str) -> Option<LockEntry> {
        self.locks.remove(resource).map(|(_, entry)| entry)
    }

    /// The lock currently held on `resource`.
    pub fn get(&self, resource: &str) -> Option<LockEntry> {
        self.locks.get(resource).map(|r| r.value().clone())
    }

    /// Every lock held by `owner`.
    pub fn locks_for(&self, owner: UserId) -> Vec<LockEntry> {
        self.locks
            .iter()
            .filter(|r| r.value().owner == owner)
            .map(|r| r.value().clone())
            .collect()
    }

    /// Snapshot of every held lock, sorted by resource for stable output.
    pub fn snapshot(&self) -> Vec<LockEntry> {
        let mut entries: Vec<LockEntry> =
            self.locks.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| a.resource.cmp(&b.resource));
        entries
    }

    /// Number of held locks.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no locks are held.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
