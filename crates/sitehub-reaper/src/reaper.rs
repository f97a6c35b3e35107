//! The periodic background maintenance loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use sitehub_core::config::reaper::ReaperConfig;
use sitehub_core::traits::jobs::JobMonitor;
use sitehub_core::traits::persistence::DurableStore;
use sitehub_events::event::{keys, types};
use sitehub_events::EventBus;
use sitehub_session::SessionRegistry;

use crate::threads::ThreadRegistry;

/// The single background maintenance worker.
///
/// Runs until shutdown on its own timer, independent of request threads:
/// every wake collects doomed workers, every `maintenance_ratio`-th wake
/// sweeps expired sessions and persists in-memory state, and every
/// `2 * maintenance_ratio`-th wake checks the running report job for
/// stalled output. Every sub-action is individually fenced — a failing
/// store or a faulty record is logged and the loop continues; nothing
/// short of shutdown stops it.
pub struct BackgroundReaper {
    /// Session registry to sweep.
    registry: Arc<SessionRegistry>,
    /// Worker-thread bookkeeping.
    threads: Arc<ThreadRegistry>,
    /// Durable-storage collaborator for periodic persistence.
    store: Arc<dyn DurableStore>,
    /// Long-running-job subsystem for the stalled-job check.
    jobs: Arc<dyn JobMonitor>,
    /// Lifecycle event fan-out.
    bus: Arc<EventBus>,
    /// Reaper configuration.
    config: ReaperConfig,
}

impl std::fmt::Debug for BackgroundReaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundReaper")
            .field("config", &self.config)
            .finish()
    }
}

impl BackgroundReaper {
    /// Creates a reaper over the given collaborators.
    pub fn new(
        registry: Arc<SessionRegistry>,
        threads: Arc<ThreadRegistry>,
        store: Arc<dyn DurableStore>,
        jobs: Arc<dyn JobMonitor>,
        bus: Arc<EventBus>,
        config: ReaperConfig,
    ) -> Self {
        Self {
            registry,
            threads,
            store,
            jobs,
            bus,
            config,
        }
    }

    /// Spawns the loop on a background task and returns its control handle.
    pub fn start(self) -> ReaperHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            self.run(cancel_rx).await;
        });
        ReaperHandle {
            cancel: cancel_tx,
            task,
        }
    }

    /// The loop body — sleeps one wake interval, runs one cycle, repeats
    /// until the cancel signal arrives. A cancel during a cycle takes
    /// effect once that cycle completes.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!(
            wake_interval_seconds = self.config.wake_interval_seconds,
            maintenance_ratio = self.config.maintenance_ratio,
            "Background reaper started"
        );

        let interval = Duration::from_secs(self.config.wake_interval_seconds);
        let mut wake: u64 = 0;

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        break;
                    }
                }
                _ = time::sleep(interval) => {
                    wake += 1;
                    self.run_cycle(wake).await;
                }
            }
        }

        info!(wakes = wake, "Background reaper shut down");
    }

    /// Runs the sub-actions scheduled for wake number `wake` (1-based).
    pub async fn run_cycle(&self, wake: u64) {
        self.sweep_doomed_threads();

        let ratio = self.config.maintenance_ratio.max(1);
        if wake % ratio == 0 {
            self.sweep_sessions();
            self.persist().await;
        }
        if wake % (2 * ratio) == 0 {
            self.check_stalled_job().await;
        }
    }

    /// Every wake: drop workers that are doomed or silent beyond the reap
    /// threshold.
    fn sweep_doomed_threads(&self) {
        let threshold = self.reap_threshold();
        let removed = self.threads.sweep(threshold, Utc::now());
        if !removed.is_empty() {
            info!(removed = removed.len(), "Doomed worker sweep completed");
        }
    }

    /// Every Nth wake: delegate to the session registry's expiry sweep and
    /// announce each removal.
    fn sweep_sessions(&self) {
        let removed = self.registry.sweep();
        for record in &removed {
            let mut data = HashMap::new();
            data.insert(
                keys::SESSION_ID.to_string(),
                serde_json::Value::String(record.session_id().to_string()),
            );
            data.insert(
                keys::USER_ID.to_string(),
                serde_json::Value::String(record.user_id().to_string()),
            );
            self.bus.publish_with(types::SESSION_EXPIRED, data);
        }
        if !removed.is_empty() {
            info!(removed = removed.len(), "Expired session sweep completed");
        }
    }

    /// Every Nth wake: flush the lock table and the audit log. Each flush
    /// failure is logged independently and never stops the loop.
    async fn persist(&self) {
        if let Err(e) = self.store.flush_locks().await {
            error!(error = %e, "Failed to flush lock table");
        }
        if let Err(e) = self.store.flush_audit_log().await {
            error!(error = %e, "Failed to flush audit log");
        }
    }

    /// Every 2·Nth wake: abandon the running report job when its worker has
    /// produced no output for longer than the reap threshold (or is no
    /// longer tracked at all).
    async fn check_stalled_job(&self) {
        let Some(job) = self.jobs.current_job().await else {
            debug!("No report job running, skipping stalled-job check");
            return;
        };

        let now = Utc::now();
        let stalled = match self.threads.last_output(&job.worker_id) {
            Some(last_output) => now - last_output > self.reap_threshold(),
            None => true,
        };
        if !stalled {
            return;
        }

        warn!(
            job_id = %job.job_id,
            worker_id = %job.worker_id,
            name = %job.name,
            "Report job stalled, abandoning"
        );
        self.threads.mark_doomed(&job.worker_id);

        match self.jobs.abandon_current(job.job_id).await {
            Ok(()) => {
                let mut data = HashMap::new();
                data.insert(
                    keys::JOB_ID.to_string(),
                    serde_json::Value::String(job.job_id.to_string()),
                );
                self.bus.publish_with(types::JOB_ABANDONED, data);
            }
            Err(e) => {
                error!(job_id = %job.job_id, error = %e, "Failed to abandon stalled job");
            }
        }
    }

    /// Idle allowance shared by the worker sweep and the stalled-job check:
    /// `maintenance_ratio` wake intervals.
    fn reap_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(
            (self.config.maintenance_ratio.max(1) * self.config.wake_interval_seconds) as i64,
        )
    }
}

/// Start/stop control for a running [`BackgroundReaper`].
#[derive(Debug)]
pub struct ReaperHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signals shutdown without waiting. Idempotent and safe to call while
    /// a wake cycle is in progress — the loop exits after finishing it.
    pub fn request_shutdown(&self) {
        let _ = self.cancel.send(true);
    }

    /// Signals shutdown and waits (bounded) for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.cancel.send(true);
        match time::timeout(Duration::from_secs(30), self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Background reaper task failed"),
            Err(_) => warn!("Background reaper did not stop within 30s"),
        }
    }
}
