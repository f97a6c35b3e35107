//! The per-session bookkeeping record.

use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use sitehub_core::types::id::{ProjectId, SessionId, UserId};

use crate::broadcast::BroadcastQueue;

/// Request context supplied by the external authentication layer on every
/// authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// The authenticated user.
    pub user_id: UserId,
    /// The site root the request addressed.
    pub site_root: String,
    /// The project the user is working in.
    pub project_id: ProjectId,
    /// The user's organizational unit path.
    pub ou_path: String,
}

/// One authenticated user session.
///
/// Identity (`session_id`, `user_id`, `created`) is immutable. Context
/// fields are updated by *replacing* the whole record in the registry via
/// [`SessionRecord::touch`], never by mutating a shared record in place —
/// readers observe a record either fully pre- or fully post-update. The
/// broadcast queue is shared across replacement copies so pending messages
/// survive a touch.
///
/// Equality and ordering compare the **user id only**; records are grouped
/// and sorted per user, and a user may hold several concurrent sessions.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    session_id: SessionId,
    user_id: UserId,
    site_root: String,
    project_id: ProjectId,
    ou_path: String,
    /// Seconds of inactivity after which the session expires. Fixed at
    /// creation from the underlying transport session.
    max_inactive_interval: u64,
    created: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    queue: Arc<OnceLock<BroadcastQueue>>,
}

impl SessionRecord {
    /// Creates a record for a session first seen now.
    pub fn new(session_id: SessionId, ctx: SessionContext, max_inactive_interval: u64) -> Self {
        Self::new_at(session_id, ctx, max_inactive_interval, Utc::now())
    }

    /// Creates a record with an explicit creation instant.
    pub fn new_at(
        session_id: SessionId,
        ctx: SessionContext,
        max_inactive_interval: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            user_id: ctx.user_id,
            site_root: ctx.site_root,
            project_id: ctx.project_id,
            ou_path: ctx.ou_path,
            max_inactive_interval,
            created: now,
            last_updated: now,
            queue: Arc::new(OnceLock::new()),
        }
    }

    /// Returns the refreshed copy stored on each request: current context
    /// fields, `last_updated` advanced, identity and queue carried over.
    pub fn touch(&self, ctx: &SessionContext) -> Self {
        self.touch_at(ctx, Utc::now())
    }

    /// [`SessionRecord::touch`] with an explicit instant.
    pub fn touch_at(&self, ctx: &SessionContext, now: DateTime<Utc>) -> Self {
        Self {
            session_id: self.session_id,
            user_id: self.user_id,
            site_root: ctx.site_root.clone(),
            project_id: ctx.project_id,
            ou_path: ctx.ou_path.clone(),
            max_inactive_interval: self.max_inactive_interval,
            created: self.created,
            last_updated: now,
            queue: Arc::clone(&self.queue),
        }
    }

    /// The session identifier.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The owning user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The site root of the most recent request.
    pub fn site_root(&self) -> &str {
        &self.site_root
    }

    /// The project of the most recent request.
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// The organizational unit path of the most recent request.
    pub fn ou_path(&self) -> &str {
        &self.ou_path
    }

    /// Seconds of inactivity before the session expires.
    pub fn max_inactive_interval(&self) -> u64 {
        self.max_inactive_interval
    }

    /// When the session was first registered.
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// When the session last saw request activity.
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// How long the session has been active.
    pub fn time_active(&self) -> Duration {
        self.last_updated - self.created
    }

    /// Whether the session has outlived its inactivity allowance at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        (now - self.last_updated).num_seconds() > self.max_inactive_interval as i64
    }

    /// [`SessionRecord::is_expired_at`] against the wall clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// The session's pending-message queue, created on first use and
    /// shared across replacement copies of this record.
    pub fn broadcast_queue(&self) -> &BroadcastQueue {
        self.queue.get_or_init(BroadcastQueue::new)
    }
}

impl PartialEq for SessionRecord {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}

impl Eq for SessionRecord {}

impl PartialOrd for SessionRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SessionRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_id.cmp(&other.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastMessage;

    fn context(user_id: UserId) -> SessionContext {
        SessionContext {
            user_id,
            site_root: "/sites/default".to_string(),
            project_id: ProjectId::new(),
            ou_path: "/".to_string(),
        }
    }

    #[test]
    fn test_expiry_is_truncating_seconds() {
        let now = Utc::now();
        let record = SessionRecord::new_at(SessionId::new(), context(UserId::new()), 1, now);

        // 1999 ms of inactivity truncates to 1 s, which is not > 1.
        assert!(!record.is_expired_at(now + Duration::milliseconds(1999)));
        assert!(record.is_expired_at(now + Duration::milliseconds(2000)));
    }

    #[test]
    fn test_touch_preserves_identity_and_queue() {
        let now = Utc::now();
        let ctx = context(UserId::new());
        let record = SessionRecord::new_at(SessionId::new(), ctx.clone(), 60, now);
        record
            .broadcast_queue()
            .push(BroadcastMessage::new(None, "pending"));

        let later = now + Duration::seconds(30);
        let mut moved = ctx.clone();
        moved.site_root = "/sites/intranet".to_string();
        let touched = record.touch_at(&moved, later);

        assert_eq!(touched.session_id(), record.session_id());
        assert_eq!(touched.created(), now);
        assert_eq!(touched.last_updated(), later);
        assert_eq!(touched.site_root(), "/sites/intranet");
        assert_eq!(touched.time_active(), Duration::seconds(30));
        // The pending message survived the replacement.
        assert_eq!(touched.broadcast_queue().pop().unwrap().text(), "pending");
    }

    #[test]
    fn test_equality_is_per_user() {
        let user = UserId::new();
        let a = SessionRecord::new(SessionId::new(), context(user), 60);
        let b = SessionRecord::new(SessionId::new(), context(user), 120);
        let c = SessionRecord::new(SessionId::new(), context(UserId::new()), 60);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
