//! Typed publish/subscribe event bus for SiteHub.
//!
//! Lifecycle notifications (login, logout, expiry, shutdown) are published
//! synchronously on the calling thread and fanned out to registered
//! listeners, decoupling producers from consumers such as the audit logger
//! and the broadcast seeder.

pub mod bus;
pub mod event;
pub mod listener;

pub use bus::EventBus;
pub use event::Event;
pub use listener::EventListener;
