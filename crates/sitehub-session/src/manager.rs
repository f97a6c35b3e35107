//! Session lifecycle manager — per-request registration, logout, and
//! broadcast seeding.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use sitehub_core::config::session::SessionConfig;
use sitehub_core::types::id::{SessionId, UserId};
use sitehub_events::event::{keys, types};
use sitehub_events::EventBus;

use crate::broadcast::BroadcastMessage;
use crate::record::{SessionContext, SessionRecord};
use crate::registry::SessionRegistry;

/// Orchestrates the session registry from the request path.
#[derive(Clone)]
pub struct SessionManager {
    /// Session record storage.
    registry: Arc<SessionRegistry>,
    /// Lifecycle event fan-out.
    bus: Arc<EventBus>,
    /// Session configuration.
    config: SessionConfig,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish()
    }
}

impl SessionManager {
    /// Creates a manager over the given registry and bus.
    pub fn new(registry: Arc<SessionRegistry>, bus: Arc<EventBus>, config: SessionConfig) -> Self {
        Self {
            registry,
            bus,
            config,
        }
    }

    /// The managed registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Registration step run for every authenticated request.
    ///
    /// Creates the record on the first touch (publishing a login event) and
    /// refreshes it on every subsequent one. Nothing here blocks beyond the
    /// registry's map access, so this is safe on the request path.
    pub fn update_session(&self, session_id: SessionId, ctx: &SessionContext) -> SessionRecord {
        if let Some(existing) = self.registry.get(&session_id) {
            let touched = existing.touch(ctx);
            self.registry.put(touched.clone());
            return touched;
        }

        let record = SessionRecord::new(
            session_id,
            ctx.clone(),
            self.config.max_inactive_interval_seconds,
        );
        self.registry.put(record.clone());

        info!(
            session_id = %session_id,
            user_id = %ctx.user_id,
            site_root = %ctx.site_root,
            "Session registered"
        );
        self.bus.publish_with(
            types::USER_LOGIN,
            session_payload(session_id, ctx.user_id),
        );

        record
    }

    /// Explicit logout / transport-session-destroyed path.
    pub fn destroy_session(&self, session_id: SessionId) -> Option<SessionRecord> {
        let removed = self.registry.remove(&session_id)?;

        info!(
            session_id = %session_id,
            user_id = %removed.user_id(),
            "Session destroyed"
        );
        self.bus.publish_with(
            types::USER_LOGOUT,
            session_payload(session_id, removed.user_id()),
        );

        Some(removed)
    }

    /// Seeds a message into the queue of every session `to_user` holds.
    ///
    /// Returns the number of sessions reached.
    pub fn send_broadcast(&self, sender: Option<UserId>, to_user: UserId, text: &str) -> usize {
        let records = self.registry.get_all_for_user(&to_user);
        for record in &records {
            record
                .broadcast_queue()
                .push(BroadcastMessage::new(sender, text));
        }

        debug!(
            to_user = %to_user,
            sessions = records.len(),
            "Broadcast queued"
        );
        records.len()
    }

    /// Seeds a message into every session's queue.
    pub fn broadcast_all(&self, sender: Option<UserId>, text: &str) -> usize {
        let records = self.registry.get_all();
        for record in &records {
            record
                .broadcast_queue()
                .push(BroadcastMessage::new(sender, text));
        }

        debug!(sessions = records.len(), "Broadcast queued to all sessions");
        records.len()
    }
}

/// Standard session lifecycle event payload.
fn session_payload(
    session_id: SessionId,
    user_id: UserId,
) -> HashMap<String, serde_json::Value> {
    let mut data = HashMap::new();
    data.insert(
        keys::SESSION_ID.to_string(),
        serde_json::Value::String(session_id.to_string()),
    );
    data.insert(
        keys::USER_ID.to_string(),
        serde_json::Value::String(user_id.to_string()),
    );
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use sitehub_core::types::id::ProjectId;
    use sitehub_events::{Event, EventListener};

    use crate::counter::SessionCounter;

    fn context(user_id: UserId) -> SessionContext {
        SessionContext {
            user_id,
            site_root: "/sites/default".to_string(),
            project_id: ProjectId::new(),
            ou_path: "/".to_string(),
        }
    }

    struct TypeRecorder(Mutex<Vec<u32>>);

    impl EventListener for TypeRecorder {
        fn on_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.event_type);
        }
    }

    fn manager() -> (SessionManager, Arc<TypeRecorder>) {
        let registry = Arc::new(SessionRegistry::new(Arc::new(SessionCounter::new())));
        let bus = Arc::new(EventBus::new());
        let recorder = Arc::new(TypeRecorder(Mutex::new(Vec::new())));
        bus.subscribe_all(recorder.clone());
        (
            SessionManager::new(registry, bus, SessionConfig::default()),
            recorder,
        )
    }

    #[test]
    fn test_update_creates_then_touches() {
        let (manager, recorder) = manager();
        let session_id = SessionId::new();
        let ctx = context(UserId::new());

        let created = manager.update_session(session_id, &ctx);
        assert_eq!(manager.registry().size(), 1);

        let mut moved = ctx.clone();
        moved.site_root = "/sites/intranet".to_string();
        let touched = manager.update_session(session_id, &moved);

        assert_eq!(touched.session_id(), created.session_id());
        assert_eq!(touched.created(), created.created());
        assert_eq!(touched.site_root(), "/sites/intranet");
        assert_eq!(manager.registry().size(), 1);

        // Only the initial registration publishes a login event.
        assert_eq!(*recorder.0.lock().unwrap(), vec![types::USER_LOGIN]);
    }

    #[test]
    fn test_destroy_publishes_logout() {
        let (manager, recorder) = manager();
        let session_id = SessionId::new();
        manager.update_session(session_id, &context(UserId::new()));

        assert!(manager.destroy_session(session_id).is_some());
        assert_eq!(manager.registry().size(), 0);
        assert!(manager.destroy_session(session_id).is_none());

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![types::USER_LOGIN, types::USER_LOGOUT]
        );
    }

    #[test]
    fn test_send_broadcast_reaches_every_session_of_user() {
        let (manager, _) = manager();
        let user = UserId::new();
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        manager.update_session(s1, &context(user));
        manager.update_session(s2, &context(user));
        manager.update_session(SessionId::new(), &context(UserId::new()));

        let reached = manager.send_broadcast(None, user, "maintenance at noon");
        assert_eq!(reached, 2);

        for session_id in [s1, s2] {
            let record = manager.registry().get(&session_id).unwrap();
            assert_eq!(
                record.broadcast_queue().pop().unwrap().text(),
                "maintenance at noon"
            );
        }
    }
}
