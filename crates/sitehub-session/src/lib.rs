//! Session lifecycle management for SiteHub.
//!
//! Tracks one [`record::SessionRecord`] per authenticated transport
//! session in a concurrent in-memory registry. Request threads register
//! and refresh records without blocking; the background reaper sweeps
//! expired records asynchronously. Each record owns a bounded broadcast
//! queue of pending messages for its user.

pub mod broadcast;
pub mod counter;
pub mod manager;
pub mod notify;
pub mod record;
pub mod registry;

pub use broadcast::{BroadcastMessage, BroadcastQueue};
pub use counter::SessionCounter;
pub use manager::SessionManager;
pub use notify::LoginMessageListener;
pub use record::{SessionContext, SessionRecord};
pub use registry::SessionRegistry;
