//! Durable-storage collaborator trait.

use async_trait::async_trait;

use crate::result::AppResult;

/// Accepts periodic flushes of in-memory mutable state to durable storage.
///
/// Implementations are called from the background reaper only, never from
/// request threads. Failures are reported as errors and the caller decides
/// whether to continue; a flush after the owning state has been torn down
/// must be a no-op rather than an error.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Flush the current resource lock table.
    async fn flush_locks(&self) -> AppResult<()>;

    /// Flush buffered audit log entries.
    async fn flush_audit_log(&self) -> AppResult<()>;
}
