//! Concurrent storage provider for session records.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info};

use sitehub_core::AppResult;
use sitehub_core::types::id::{SessionId, UserId};

use crate::counter::SessionCounter;
use crate::record::SessionRecord;

/// Concurrent map of session id → [`SessionRecord`].
///
/// Mutated by many request threads (one record per request touch) and
/// read/swept by exactly one background thread. All snapshot accessors
/// iterate safely while the map mutates; neither side ever blocks the
/// other beyond the cost of a shard access.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionRecord>,
    counter: Arc<SessionCounter>,
    closed: AtomicBool,
}

impl SessionRegistry {
    /// Creates a registry reporting into the given counters.
    pub fn new(counter: Arc<SessionCounter>) -> Self {
        Self {
            sessions: DashMap::new(),
            counter,
            closed: AtomicBool::new(false),
        }
    }

    /// Prepares an empty registry for use.
    ///
    /// An error here is fatal: the owning runtime must not reach serving
    /// state without a session registry.
    pub fn initialize(&self) -> AppResult<()> {
        self.sessions.clear();
        self.closed.store(false, Ordering::SeqCst);
        info!("Session registry initialized");
        Ok(())
    }

    /// Looks up a record by session id.
    pub fn get(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.sessions.get(session_id).map(|r| r.value().clone())
    }

    /// Stores a record, returning the one it replaced.
    ///
    /// After shutdown this is a no-op.
    pub fn put(&self, record: SessionRecord) -> Option<SessionRecord> {
        if self.is_closed() {
            debug!(
                session_id = %record.session_id(),
                "Registry is shut down, dropping put"
            );
            return None;
        }

        let previous = self.sessions.insert(record.session_id(), record);
        if previous.is_none() {
            self.counter.increment();
        }
        previous
    }

    /// Removes and returns a record.
    pub fn remove(&self, session_id: &SessionId) -> Option<SessionRecord> {
        let removed = self.sessions.remove(session_id).map(|(_, record)| record);
        if removed.is_some() {
            self.counter.decrement();
        }
        removed
    }

    /// Snapshot of every record. Safe to take while other threads mutate
    /// the registry.
    pub fn get_all(&self) -> Vec<SessionRecord> {
        self.sessions.iter().map(|r| r.value().clone()).collect()
    }

    /// Snapshot of every record belonging to `user_id`; empty when the
    /// user has no sessions.
    pub fn get_all_for_user(&self, user_id: &UserId) -> Vec<SessionRecord> {
        self.sessions
            .iter()
            .filter(|r| r.value().user_id() == *user_id)
            .map(|r| r.value().clone())
            .collect()
    }

    /// Current number of records.
    pub fn size(&self) -> usize {
        self.sessions.len()
    }

    /// Removes every expired record, returning the removed set.
    ///
    /// Removal lags true expiry by up to one sweep interval; expiry is a
    /// soft timeout checked only here.
    pub fn sweep(&self) -> Vec<SessionRecord> {
        self.sweep_at(Utc::now())
    }

    /// [`SessionRegistry::sweep`] against an explicit instant.
    ///
    /// Expiry is re-checked under the shard lock on removal, so a record
    /// touched between the snapshot and the removal survives. Safe against
    /// concurrent put/remove; a second immediate sweep removes nothing.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Vec<SessionRecord> {
        if self.is_closed() {
            return Vec::new();
        }

        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|r| r.value().is_expired_at(now))
            .map(|r| *r.key())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for session_id in expired {
            if let Some((_, record)) = self
                .sessions
                .remove_if(&session_id, |_, record| record.is_expired_at(now))
            {
                self.counter.decrement();
                removed.push(record);
            }
        }

        if !removed.is_empty() {
            debug!(removed = removed.len(), "Session sweep removed expired records");
        }
        removed
    }

    /// Clears all records and closes the registry.
    ///
    /// Idempotent; sweeps and puts after shutdown are no-ops, never errors.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let drained = self.sessions.len();
        self.sessions.clear();
        self.counter.reset_active();
        info!(drained, "Session registry shut down");
    }

    /// Whether [`SessionRegistry::shutdown`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sitehub_core::types::id::ProjectId;

    use crate::record::SessionContext;

    fn context(user_id: UserId) -> SessionContext {
        SessionContext {
            user_id,
            site_root: "/sites/default".to_string(),
            project_id: ProjectId::new(),
            ou_path: "/".to_string(),
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(SessionCounter::new()))
    }

    fn record_at(user_id: UserId, max_inactive: u64, now: DateTime<Utc>) -> SessionRecord {
        SessionRecord::new_at(SessionId::new(), context(user_id), max_inactive, now)
    }

    #[test]
    fn test_put_get_remove() {
        let registry = registry();
        let record = record_at(UserId::new(), 60, Utc::now());
        let session_id = record.session_id();

        assert!(registry.put(record.clone()).is_none());
        let fetched = registry.get(&session_id).unwrap();
        assert_eq!(fetched.session_id(), session_id);
        assert_eq!(registry.size(), 1);

        // Overwrite by session id returns the previous record.
        let touched = record.touch(&context(record.user_id()));
        assert!(registry.put(touched).is_some());
        assert_eq!(registry.size(), 1);

        assert!(registry.remove(&session_id).is_some());
        assert!(registry.get(&session_id).is_none());
        assert_eq!(registry.size(), 0);
    }

    #[test]
    fn test_get_all_for_user_unknown_is_empty() {
        let registry = registry();
        registry.put(record_at(UserId::new(), 60, Utc::now()));

        let matches = registry.get_all_for_user(&UserId::new());
        assert!(matches.is_empty());
    }

    #[test]
    fn test_sweep_multi_user_scenario() {
        // 3 sessions for user A, 1 for user B, all with a 1 s allowance;
        // swept 2 s later everything must be gone.
        let registry = registry();
        let now = Utc::now();
        let user_a = UserId::new();
        let user_b = UserId::new();

        for _ in 0..3 {
            registry.put(record_at(user_a, 1, now));
        }
        registry.put(record_at(user_b, 1, now));
        assert_eq!(registry.size(), 4);
        assert_eq!(registry.get_all_for_user(&user_a).len(), 3);

        let removed = registry.sweep_at(now + Duration::seconds(2));
        assert_eq!(removed.len(), 4);
        assert_eq!(registry.size(), 0);
        assert!(registry.get_all_for_user(&user_a).is_empty());
    }

    #[test]
    fn test_sweep_removes_exactly_the_expired_set() {
        let registry = registry();
        let now = Utc::now();

        let stale = record_at(UserId::new(), 1, now);
        let fresh = record_at(UserId::new(), 3600, now);
        registry.put(stale.clone());
        registry.put(fresh.clone());

        let sweep_time = now + Duration::seconds(5);
        let removed = registry.sweep_at(sweep_time);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].session_id(), stale.session_id());
        assert!(registry.get(&fresh.session_id()).is_some());

        // Idempotent: an immediate second sweep removes nothing further.
        assert!(registry.sweep_at(sweep_time).is_empty());
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn test_sweep_tolerates_concurrent_puts() {
        let registry = Arc::new(registry());
        let now = Utc::now();
        for _ in 0..100 {
            registry.put(record_at(UserId::new(), 1, now));
        }

        let writer = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    registry.put(record_at(UserId::new(), 3600, Utc::now()));
                }
            })
        };

        let removed = registry.sweep_at(now + Duration::seconds(2));
        writer.join().unwrap();

        assert_eq!(removed.len(), 100);
        assert_eq!(registry.size(), 100);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_quiesces() {
        let counter = Arc::new(SessionCounter::new());
        let registry = SessionRegistry::new(Arc::clone(&counter));
        registry.initialize().unwrap();
        registry.put(record_at(UserId::new(), 1, Utc::now()));

        registry.shutdown();
        registry.shutdown();

        assert!(registry.is_closed());
        assert_eq!(registry.size(), 0);
        assert_eq!(counter.active(), 0);

        // Post-shutdown operations are no-ops, never errors.
        assert!(registry.sweep().is_empty());
        assert!(registry.put(record_at(UserId::new(), 1, Utc::now())).is_none());
        assert_eq!(registry.size(), 0);
    }
}
