//! The listener side of the event bus.

use crate::event::Event;

/// Receives events dispatched by the [`crate::EventBus`].
///
/// `on_event` runs synchronously on the publishing thread and inside its
/// own failure boundary: a panicking listener is logged and skipped, and
/// the remaining listeners still fire.
pub trait EventListener: Send + Sync {
    /// Handle one dispatched event.
    fn on_event(&self, event: &Event);

    /// Identity used when logging dispatch failures.
    fn name(&self) -> &str {
        "unnamed-listener"
    }
}
