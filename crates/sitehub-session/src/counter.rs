//! Session totals, owned by the runtime composer.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Atomic counters over the session registry's population.
///
/// Created by whatever composes the runtime and injected into the
/// registry; nothing here is process-global state.
#[derive(Debug, Default)]
pub struct SessionCounter {
    /// Sessions currently present in the registry.
    active: AtomicI64,
    /// Sessions created since startup.
    total_created: AtomicU64,
}

impl SessionCounter {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one session added to the registry.
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.total_created.fetch_add(1, Ordering::SeqCst);
    }

    /// Records one session removed from the registry.
    pub fn decrement(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Resets the active count, keeping the created total.
    pub fn reset_active(&self) {
        self.active.store(0, Ordering::SeqCst);
    }

    /// Sessions currently in the registry.
    pub fn active(&self) -> i64 {
        self.active.load(Ordering::SeqCst).max(0)
    }

    /// Sessions created since startup.
    pub fn total_created(&self) -> u64 {
        self.total_created.load(Ordering::SeqCst)
    }
}
