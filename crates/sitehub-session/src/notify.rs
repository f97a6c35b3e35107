//! Event-bus consumer seeding the login broadcast message.

use std::sync::Arc;

use tracing::debug;

use sitehub_core::types::id::SessionId;
use sitehub_events::event::{keys, types};
use sitehub_events::{Event, EventListener};

use crate::broadcast::BroadcastMessage;
use crate::registry::SessionRegistry;

/// Pushes the configured login message into a session's broadcast queue
/// when its login event fires.
pub struct LoginMessageListener {
    registry: Arc<SessionRegistry>,
    message: String,
}

impl LoginMessageListener {
    /// Creates a listener delivering `message` on every login.
    pub fn new(registry: Arc<SessionRegistry>, message: impl Into<String>) -> Self {
        Self {
            registry,
            message: message.into(),
        }
    }
}

impl EventListener for LoginMessageListener {
    fn on_event(&self, event: &Event) {
        if event.event_type != types::USER_LOGIN {
            return;
        }
        let Some(session_id) = event
            .get_str(keys::SESSION_ID)
            .and_then(|s| s.parse::<SessionId>().ok())
        else {
            return;
        };

        if let Some(record) = self.registry.get(&session_id) {
            record
                .broadcast_queue()
                .push(BroadcastMessage::new(None, self.message.clone()));
            debug!(session_id = %session_id, "Login message queued");
        }
    }

    fn name(&self) -> &str {
        "login-message-listener"
    }
}
