//! End-to-end reaper cycles over fully wired collaborators.

mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};

use sitehub_core::config::reaper::ReaperConfig;
use sitehub_core::traits::jobs::JobMonitor;
use sitehub_core::traits::persistence::DurableStore;
use sitehub_core::types::id::SessionId;
use sitehub_events::EventBus;
use sitehub_jobs::ReportJobQueue;
use sitehub_reaper::{BackgroundReaper, ThreadRegistry};
use sitehub_session::{SessionCounter, SessionRecord, SessionRegistry};
use sitehub_storage::{AuditEventListener, AuditLog, LocalDurableStore, LockTable};

struct World {
    reaper: BackgroundReaper,
    registry: Arc<SessionRegistry>,
    threads: Arc<ThreadRegistry>,
    jobs: Arc<ReportJobQueue>,
    store: Arc<LocalDurableStore>,
    audit_log: Arc<AuditLog>,
    lock_table: Arc<LockTable>,
}

fn world(data_root: &str) -> World {
    let registry = Arc::new(SessionRegistry::new(Arc::new(SessionCounter::new())));
    registry.initialize().expect("registry init");

    let bus = Arc::new(EventBus::new());
    let audit_log = Arc::new(AuditLog::new());
    bus.subscribe_all(Arc::new(AuditEventListener::new(Arc::clone(&audit_log))));

    let lock_table = Arc::new(LockTable::new());
    let store = Arc::new(LocalDurableStore::new(
        Arc::clone(&lock_table),
        Arc::clone(&audit_log),
        data_root,
    ));

    let threads = Arc::new(ThreadRegistry::new());
    let jobs = Arc::new(ReportJobQueue::new(Arc::clone(&threads)));

    let reaper = BackgroundReaper::new(
        Arc::clone(&registry),
        Arc::clone(&threads),
        Arc::clone(&store) as Arc<dyn DurableStore>,
        Arc::clone(&jobs) as Arc<dyn JobMonitor>,
        bus,
        ReaperConfig {
            enabled: true,
            wake_interval_seconds: 60,
            maintenance_ratio: 5,
        },
    );

    World {
        reaper,
        registry,
        threads,
        jobs,
        store,
        audit_log,
        lock_table,
    }
}

fn expired_record() -> SessionRecord {
    SessionRecord::new_at(
        SessionId::new(),
        helpers::fresh_context(),
        1,
        Utc::now() - Duration::seconds(10),
    )
}

#[tokio::test]
async fn test_maintenance_wake_sweeps_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let w = world(dir.path().to_str().unwrap());

    w.registry.put(expired_record());
    w.lock_table
        .lock("/sites/default/index.html", helpers::fresh_context().user_id);

    // Wakes 1-4 only collect doomed workers.
    for wake in 1..=4 {
        w.reaper.run_cycle(wake).await;
    }
    assert_eq!(w.registry.size(), 1);
    assert!(!dir.path().join("locks.json").exists());

    // Wake 5 sweeps the expired session and persists state.
    w.reaper.run_cycle(5).await;
    assert_eq!(w.registry.size(), 0);
    assert!(dir.path().join("locks.json").exists());

    // The sweep's expiry event went through the bus into the audit file.
    let audit = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
    assert!(audit.contains("session_expired"));
}

#[tokio::test]
async fn test_stalled_report_job_is_abandoned_and_queue_advances() {
    let dir = tempfile::tempdir().unwrap();
    let w = world(dir.path().to_str().unwrap());

    let first = w.jobs.enqueue("export-users");
    let second = w.jobs.enqueue("export-files");

    // Backdate the running worker's output far past the reap threshold.
    let stalled_worker = w.jobs.current_job().await.unwrap().worker_id;
    w.threads
        .touch_output_at(&stalled_worker, Utc::now() - Duration::seconds(3600));

    // Wake 5 runs maintenance but no stalled-job check.
    w.reaper.run_cycle(5).await;
    assert_eq!(w.jobs.current_job().await.unwrap().job_id, first);

    // Wake 10 abandons the stalled job and the queue advances.
    w.reaper.run_cycle(10).await;
    let running = w.jobs.current_job().await.unwrap();
    assert_eq!(running.job_id, second);
    assert!(w.threads.is_doomed(&stalled_worker));

    // The next wake's doomed sweep collects the abandoned worker.
    w.reaper.run_cycle(11).await;
    assert!(!w.threads.contains(&stalled_worker));

    // The abandonment reached the audit trail.
    w.store.flush_audit_log().await.unwrap();
    let audit = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
    assert!(audit.contains("job_abandoned"));
    assert!(audit.contains(&first.to_string()));
}

#[tokio::test]
async fn test_shutdown_order_is_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let w = world(dir.path().to_str().unwrap());

    w.registry.put(expired_record());
    w.registry.shutdown();

    // A maintenance wake after registry teardown must be a harmless no-op.
    w.reaper.run_cycle(5).await;
    assert_eq!(w.registry.size(), 0);
    assert_eq!(w.audit_log.len(), 0);
}
