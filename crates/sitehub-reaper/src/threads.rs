//! Bookkeeping registry for long-running worker threads.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use dashmap::DashMap;
use tracing::debug;

use sitehub_core::types::id::WorkerId;

/// Liveness bookkeeping for one tracked worker.
///
/// The doomed flag and the last-output timestamp are atomics so worker
/// threads update them in place without touching the map's shard locks.
#[derive(Debug)]
struct ThreadRecord {
    name: String,
    doomed: AtomicBool,
    last_output_ms: AtomicI64,
    started: DateTime<Utc>,
}

/// Read-only view of a tracked worker.
#[derive(Debug, Clone)]
pub struct WorkerSnapshot {
    /// The worker identifier.
    pub worker_id: WorkerId,
    /// Human-readable worker name.
    pub name: String,
    /// Whether the worker has been flagged for teardown.
    pub doomed: bool,
    /// When the worker last produced output.
    pub last_output: DateTime<Utc>,
    /// When the worker was registered.
    pub started: DateTime<Utc>,
}

/// Registry of all tracked worker threads, shared between the workers
/// themselves and the background reaper.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    workers: DashMap<WorkerId, ThreadRecord>,
}

impl ThreadRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a new worker, returning its identifier.
    pub fn register(&self, name: &str) -> WorkerId {
        self.register_at(name, Utc::now())
    }

    /// [`ThreadRegistry::register`] with an explicit start instant.
    pub fn register_at(&self, name: &str, now: DateTime<Utc>) -> WorkerId {
        let worker_id = WorkerId::new();
        self.workers.insert(
            worker_id,
            ThreadRecord {
                name: name.to_string(),
                doomed: AtomicBool::new(false),
                last_output_ms: AtomicI64::new(now.timestamp_millis()),
                started: now,
            },
        );
        debug!(worker_id = %worker_id, name, "Worker registered");
        worker_id
    }

    /// Records output activity for a worker. Returns `false` when the
    /// worker is no longer tracked.
    pub fn touch_output(&self, worker_id: &WorkerId) -> bool {
        self.touch_output_at(worker_id, Utc::now())
    }

    /// [`ThreadRegistry::touch_output`] with an explicit instant.
    pub fn touch_output_at(&self, worker_id: &WorkerId, now: DateTime<Utc>) -> bool {
        match self.workers.get(worker_id) {
            Some(record) => {
                record
                    .last_output_ms
                    .store(now.timestamp_millis(), Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Flags a worker for teardown on the next sweep. Returns `false` when
    /// the worker is no longer tracked.
    pub fn mark_doomed(&self, worker_id: &WorkerId) -> bool {
        match self.workers.get(worker_id) {
            Some(record) => {
                record.doomed.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Whether the worker is flagged for teardown.
    pub fn is_doomed(&self, worker_id: &WorkerId) -> bool {
        self.workers
            .get(worker_id)
            .map(|r| r.doomed.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// When the worker last produced output.
    pub fn last_output(&self, worker_id: &WorkerId) -> Option<DateTime<Utc>> {
        self.workers
            .get(worker_id)
            .map(|r| millis_to_utc(r.last_output_ms.load(Ordering::SeqCst)))
    }

    /// Whether the worker is currently tracked.
    pub fn contains(&self, worker_id: &WorkerId) -> bool {
        self.workers.contains_key(worker_id)
    }

    /// Number of tracked workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Snapshot of every tracked worker.
    pub fn snapshot(&self) -> Vec<WorkerSnapshot> {
        self.workers
            .iter()
            .map(|r| WorkerSnapshot {
                worker_id: *r.key(),
                name: r.value().name.clone(),
                doomed: r.value().doomed.load(Ordering::SeqCst),
                last_output: millis_to_utc(r.value().last_output_ms.load(Ordering::SeqCst)),
                started: r.value().started,
            })
            .collect()
    }

    /// Removes every worker that is doomed or idle beyond `reap_threshold`,
    /// returning the removed ids. Safe against concurrent registration and
    /// touches; a worker touched mid-sweep survives.
    pub fn sweep(&self, reap_threshold: Duration, now: DateTime<Utc>) -> Vec<WorkerId> {
        let reapable = |record: &ThreadRecord| {
            record.doomed.load(Ordering::SeqCst)
                || now - millis_to_utc(record.last_output_ms.load(Ordering::SeqCst))
                    > reap_threshold
        };

        let candidates: Vec<WorkerId> = self
            .workers
            .iter()
            .filter(|r| reapable(r.value()))
            .map(|r| *r.key())
            .collect();

        let mut removed = Vec::with_capacity(candidates.len());
        for worker_id in candidates {
            if let Some((_, record)) = self.workers.remove_if(&worker_id, |_, r| reapable(r)) {
                debug!(
                    worker_id = %worker_id,
                    name = %record.name,
                    doomed = record.doomed.load(Ordering::SeqCst),
                    "Worker reaped"
                );
                removed.push(worker_id);
            }
        }
        removed
    }
}

fn millis_to_utc(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}
