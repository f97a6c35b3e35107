//! Collaborator traits consumed by the background reaper.

pub mod jobs;
pub mod persistence;

pub use jobs::{JobMonitor, RunningJob};
pub use persistence::DurableStore;
