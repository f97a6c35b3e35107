//! In-memory audit log buffer and its event-bus feeder.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use sitehub_core::types::id::UserId;
use sitehub_events::event::{keys, types};
use sitehub_events::{Event, EventListener};

/// One audit log entry awaiting persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// The acting user, or `None` for system actions.
    pub actor: Option<UserId>,
    /// Short action name, e.g. `"user_login"`.
    pub action: String,
    /// Free-form detail.
    pub detail: String,
}

/// Buffer of audit entries, drained by the periodic persistence pass.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry stamped with the current time.
    pub fn record(&self, actor: Option<UserId>, action: &str, detail: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(AuditEntry {
                timestamp: Utc::now(),
                actor,
                action: action.to_string(),
                detail: detail.into(),
            });
    }

    /// Removes and returns all buffered entries.
    pub fn drain(&self) -> Vec<AuditEntry> {
        std::mem::take(
            &mut *self
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Puts drained entries back at the front after a failed flush.
    pub fn restore(&self, mut failed: Vec<AuditEntry>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        failed.append(&mut entries);
        *entries = failed;
    }

    /// Number of buffered entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Event-bus subscriber turning lifecycle events into audit entries.
pub struct AuditEventListener {
    log: Arc<AuditLog>,
}

impl AuditEventListener {
    /// Creates a listener feeding `log`.
    pub fn new(log: Arc<AuditLog>) -> Self {
        Self { log }
    }
}

impl EventListener for AuditEventListener {
    fn on_event(&self, event: &Event) {
        let action = match event.event_type {
            types::USER_LOGIN => "user_login",
            types::USER_LOGOUT => "user_logout",
            types::SESSION_EXPIRED => "session_expired",
            types::JOB_ABANDONED => "job_abandoned",
            types::SYSTEM_SHUTDOWN => "system_shutdown",
            _ => return,
        };

        let actor = event
            .get_str(keys::USER_ID)
            .and_then(|s| s.parse::<UserId>().ok());
        let detail = event
            .get_str(keys::SESSION_ID)
            .map(|s| format!("session={s}"))
            .or_else(|| {
                event
                    .get_str(keys::JOB_ID)
                    .map(|s| format!("job={s}"))
            })
            .unwrap_or_default();

        self.log.record(actor, action, detail);
        debug!(action, "Audit entry recorded");
    }

    fn name(&self) -> &str {
        "audit-event-listener"
    }
}
