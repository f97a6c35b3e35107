//! The single-runner report job queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use sitehub_core::traits::jobs::{JobMonitor, RunningJob};
use sitehub_core::types::id::JobId;
use sitehub_core::AppResult;
use sitehub_reaper::ThreadRegistry;

/// A job waiting for its turn.
#[derive(Debug, Clone)]
struct QueuedJob {
    job_id: JobId,
    name: String,
}

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<QueuedJob>,
    current: Option<RunningJob>,
}

/// FIFO queue of report jobs with at most one running at a time.
///
/// Starting a job registers a worker record in the thread registry;
/// finishing or abandoning one dooms that record so the reaper collects
/// it, then the next queued job starts immediately.
#[derive(Debug)]
pub struct ReportJobQueue {
    state: Mutex<State>,
    threads: Arc<ThreadRegistry>,
}

impl ReportJobQueue {
    /// Creates an empty queue registering workers into `threads`.
    pub fn new(threads: Arc<ThreadRegistry>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            threads,
        }
    }

    /// Enqueues a job; it starts immediately when no job is running.
    pub fn enqueue(&self, name: &str) -> JobId {
        let job_id = JobId::new();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.queue.push_back(QueuedJob {
            job_id,
            name: name.to_string(),
        });
        debug!(job_id = %job_id, name, queued = state.queue.len(), "Report job enqueued");

        if state.current.is_none() {
            self.advance(&mut state);
        }
        job_id
    }

    /// Marks the running job as finished and advances the queue.
    ///
    /// A stale id (the job was already abandoned) is ignored.
    pub fn complete_current(&self, job_id: JobId) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(running) = state.current.clone() else {
            return;
        };
        if running.job_id != job_id {
            debug!(job_id = %job_id, "Stale completion ignored");
            return;
        }

        info!(job_id = %job_id, name = %running.name, "Report job completed");
        self.threads.mark_doomed(&running.worker_id);
        state.current = None;
        self.advance(&mut state);
    }

    /// Number of jobs waiting behind the running one.
    pub fn queued_len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .queue
            .len()
    }

    /// Pops the next queued job and makes it the running one.
    fn advance(&self, state: &mut State) {
        let Some(next) = state.queue.pop_front() else {
            return;
        };
        let worker_id = self.threads.register(&next.name);
        info!(job_id = %next.job_id, name = %next.name, worker_id = %worker_id, "Report job started");
        state.current = Some(RunningJob {
            job_id: next.job_id,
            worker_id,
            name: next.name,
            started: Utc::now(),
        });
    }
}

#[async_trait]
impl JobMonitor for ReportJobQueue {
    async fn current_job(&self) -> Option<RunningJob> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    async fn abandon_current(&self, job_id: JobId) -> AppResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(running) = state.current.clone() else {
            return Ok(());
        };
        if running.job_id != job_id {
            // The job finished between the stall check and this call.
            debug!(job_id = %job_id, "Stale abandon ignored");
            return Ok(());
        }

        info!(job_id = %job_id, name = %running.name, "Report job abandoned");
        self.threads.mark_doomed(&running.worker_id);
        state.current = None;
        self.advance(&mut state);
        Ok(())
    }
}
