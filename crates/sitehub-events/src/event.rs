//! The event value dispatched through the bus.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Well-known event type codes.
pub mod types {
    /// A user logged in and a session record was created.
    pub const USER_LOGIN: u32 = 1;
    /// A session was destroyed by explicit logout.
    pub const USER_LOGOUT: u32 = 2;
    /// A session was removed by the expiry sweep.
    pub const SESSION_EXPIRED: u32 = 3;
    /// A stalled report job was abandoned by the reaper.
    pub const JOB_ABANDONED: u32 = 4;
    /// The runtime is shutting down.
    pub const SYSTEM_SHUTDOWN: u32 = 5;
    /// Sentinel type a listener subscribes to in order to receive every event.
    pub const ALL_EVENTS: u32 = u32::MAX;
}

/// Well-known payload keys.
pub mod keys {
    /// Session id, as a UUID string.
    pub const SESSION_ID: &str = "session_id";
    /// User id, as a UUID string.
    pub const USER_ID: &str = "user_id";
    /// Job id, as a UUID string.
    pub const JOB_ID: &str = "job_id";
}

/// A lifecycle notification: an integer type code plus an opaque payload map.
///
/// Equality and hashing use the type code **only** — two events of the same
/// type compare equal regardless of payload. Long-standing behavior that
/// listeners depend on for dedup sets; do not "fix".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// The event type code (see [`types`]).
    pub event_type: u32,
    /// Opaque payload, keyed by the constants in [`keys`].
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Create an event with a payload.
    pub fn new(event_type: u32, data: HashMap<String, serde_json::Value>) -> Self {
        Self { event_type, data }
    }

    /// Create an event with an empty payload.
    pub fn of(event_type: u32) -> Self {
        Self {
            event_type,
            data: HashMap::new(),
        }
    }

    /// Look up a payload value.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Look up a payload value as a string slice.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.event_type == other.event_type
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.event_type.hash(state);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut event_keys: Vec<&str> = self.data.keys().map(String::as_str).collect();
        event_keys.sort_unstable();
        write!(f, "Event[type={}, keys={:?}]", self.event_type, event_keys)
    }
}
