//! Local filesystem durable store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use sitehub_core::error::{AppError, ErrorKind};
use sitehub_core::result::AppResult;
use sitehub_core::traits::persistence::DurableStore;

use crate::audit::AuditLog;
use crate::locks::LockTable;

/// Name of the lock table snapshot file under the data root.
const LOCKS_FILE: &str = "locks.json";
/// Name of the append-only audit log file under the data root.
const AUDIT_FILE: &str = "audit.log";

/// Persists the lock table and audit log to local files.
///
/// Called only from the background reaper; a flush with nothing to write
/// is a cheap no-op, so flushing after the owning state has been torn
/// down is harmless.
#[derive(Debug, Clone)]
pub struct LocalDurableStore {
    /// The lock table to snapshot.
    lock_table: Arc<LockTable>,
    /// The audit buffer to drain.
    audit: Arc<AuditLog>,
    /// Root directory for persisted files.
    root: PathBuf,
}

impl LocalDurableStore {
    /// Creates a store writing under `data_root`.
    pub fn new(lock_table: Arc<LockTable>, audit: Arc<AuditLog>, data_root: &str) -> Self {
        Self {
            lock_table,
            audit,
            root: PathBuf::from(data_root),
        }
    }

    /// Ensure the data root directory exists.
    async fn ensure_root(&self) -> AppResult<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create data root: {}", self.root.display()),
                e,
            )
        })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }
}

#[async_trait]
impl DurableStore for LocalDurableStore {
    async fn flush_locks(&self) -> AppResult<()> {
        let snapshot = self.lock_table.snapshot();
        self.ensure_root().await?;

        let json = serde_json::to_vec_pretty(&snapshot)?;
        let path = self.path(LOCKS_FILE);
        fs::write(&path, json).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write lock table: {}", path.display()),
                e,
            )
        })?;

        debug!(locks = snapshot.len(), path = %path.display(), "Lock table flushed");
        Ok(())
    }

    async fn flush_audit_log(&self) -> AppResult<()> {
        let entries = self.audit.drain();
        if entries.is_empty() {
            return Ok(());
        }

        let result = append_audit_lines(&self.path(AUDIT_FILE), &self.root, &entries).await;
        if result.is_err() {
            // Keep the entries for the next flush attempt.
            self.audit.restore(entries);
            return result;
        }

        debug!(entries = entries.len(), "Audit log flushed");
        Ok(())
    }
}

/// Appends one JSON line per entry to the audit file.
async fn append_audit_lines(
    path: &Path,
    root: &Path,
    entries: &[crate::audit::AuditEntry],
) -> AppResult<()> {
    fs::create_dir_all(root).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to create data root: {}", root.display()),
            e,
        )
    })?;

    let mut lines = String::new();
    for entry in entries {
        lines.push_str(&serde_json::to_string(entry)?);
        lines.push('\n');
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to open audit log: {}", path.display()),
                e,
            )
        })?;

    file.write_all(lines.as_bytes()).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to append audit log: {}", path.display()),
            e,
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use sitehub_core::types::id::UserId;

    use crate::audit::AuditEntry;

    fn store(dir: &Path) -> (LocalDurableStore, Arc<LockTable>, Arc<AuditLog>) {
        let lock_table = Arc::new(LockTable::new());
        let audit = Arc::new(AuditLog::new());
        let store = LocalDurableStore::new(
            Arc::clone(&lock_table),
            Arc::clone(&audit),
            dir.to_str().unwrap(),
        );
        (store, lock_table, audit)
    }

    #[tokio::test]
    async fn test_flush_locks_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (store, lock_table, _) = store(dir.path());

        let owner = UserId::new();
        lock_table.lock("/sites/default/index.html", owner);
        store.flush_locks().await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("locks.json")).unwrap();
        let parsed: Vec<crate::locks::LockEntry> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].resource, "/sites/default/index.html");
        assert_eq!(parsed[0].owner, owner);
    }

    #[tokio::test]
    async fn test_flush_audit_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _, audit) = store(dir.path());

        audit.record(None, "user_login", "session=s-1");
        store.flush_audit_log().await.unwrap();
        audit.record(None, "user_logout", "session=s-1");
        store.flush_audit_log().await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.action, "user_login");
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_flush_empty_audit_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _, _) = store(dir.path());

        store.flush_audit_log().await.unwrap();
        assert!(!dir.path().join("audit.log").exists());
    }
}
