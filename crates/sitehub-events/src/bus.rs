//! Synchronous event dispatch with per-listener failure isolation.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error};

use crate::event::{types, Event};
use crate::listener::EventListener;

/// Typed publish/subscribe bus for lifecycle events.
///
/// Listener registration is keyed by event type code; the sentinel
/// [`types::ALL_EVENTS`] subscribes a listener to every type. Dispatch is
/// synchronous on the publishing thread against a snapshot of the listener
/// lists taken at fire time, so a subscribe or unsubscribe racing a publish
/// never affects the in-flight dispatch.
pub struct EventBus {
    /// Event type code → listeners in registration order.
    listeners: RwLock<HashMap<u32, Vec<Arc<dyn EventListener>>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventBus")
            .field("types", &listeners.len())
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a listener for the given event type codes.
    ///
    /// Re-registering the same listener (by `Arc` identity) for a type it
    /// already holds is a no-op, not a duplicate.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>, event_types: &[u32]) {
        let mut map = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        for &event_type in event_types {
            let registered = map.entry(event_type).or_default();
            if !registered.iter().any(|l| Arc::ptr_eq(l, &listener)) {
                registered.push(Arc::clone(&listener));
            }
        }
    }

    /// Registers a listener for every event type.
    pub fn subscribe_all(&self, listener: Arc<dyn EventListener>) {
        self.subscribe(listener, &[types::ALL_EVENTS]);
    }

    /// Removes a listener from every type it was registered under.
    pub fn unsubscribe(&self, listener: &Arc<dyn EventListener>) {
        let mut map = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        map.retain(|_, registered| {
            registered.retain(|l| !Arc::ptr_eq(l, listener));
            !registered.is_empty()
        });
    }

    /// Publishes an event, synchronously, on the calling thread.
    ///
    /// Listeners registered for the event's type fire first, then listeners
    /// registered for all events, each in registration order. A listener
    /// that panics is logged and skipped; `publish` itself never fails.
    pub fn publish(&self, event: &Event) {
        let targets = {
            let map = self
                .listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner);

            let mut targets: Vec<Arc<dyn EventListener>> = map
                .get(&event.event_type)
                .map(|v| v.to_vec())
                .unwrap_or_default();
            if event.event_type != types::ALL_EVENTS {
                if let Some(wildcard) = map.get(&types::ALL_EVENTS) {
                    targets.extend(wildcard.iter().cloned());
                }
            }
            targets
        };

        if targets.is_empty() {
            debug!(event = %event, "No listeners registered for event");
            return;
        }

        for listener in &targets {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if outcome.is_err() {
                error!(
                    listener = listener.name(),
                    event = %event,
                    "Event listener panicked during dispatch"
                );
            }
        }
    }

    /// Publishes an event of the given type with an empty payload.
    pub fn publish_type(&self, event_type: u32) {
        self.publish(&Event::of(event_type));
    }

    /// Publishes an event of the given type with the given payload.
    pub fn publish_with(
        &self,
        event_type: u32,
        data: HashMap<String, serde_json::Value>,
    ) {
        self.publish(&Event::new(event_type, data));
    }

    /// Total number of (listener, type) registrations.
    pub fn registration_count(&self) -> usize {
        let map = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        map.values().map(Vec::len).sum()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
