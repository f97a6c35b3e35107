//! Background maintenance for SiteHub.
//!
//! One long-lived reaper task wakes on a fixed interval to collect doomed
//! worker threads, sweep expired sessions, persist in-memory state, and
//! abandon stalled report jobs. Request threads are never blocked by any
//! of this.

pub mod reaper;
pub mod threads;

pub use reaper::{BackgroundReaper, ReaperHandle};
pub use threads::{ThreadRegistry, WorkerSnapshot};
