//! Long-running-job collaborator trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;
use crate::types::id::{JobId, WorkerId};

/// A long-running report job currently executing on a tracked worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningJob {
    /// The job identifier.
    pub job_id: JobId,
    /// The worker thread executing the job.
    pub worker_id: WorkerId,
    /// Human-readable job name for logging.
    pub name: String,
    /// When the job started.
    pub started: DateTime<Utc>,
}

/// Exposes the long-running-job subsystem to the stalled-job check.
#[async_trait]
pub trait JobMonitor: Send + Sync {
    /// The currently running job, if any.
    async fn current_job(&self) -> Option<RunningJob>;

    /// Abandon the given job and advance to the next queued one.
    ///
    /// The id is passed back so a job that completed between the check and
    /// the abandon call is not clobbered.
    async fn abandon_current(&self, job_id: JobId) -> AppResult<()>;
}
