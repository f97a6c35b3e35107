//! Long-running report jobs for SiteHub.
//!
//! Report jobs (exports, audits, bulk operations) run one at a time on a
//! tracked worker thread. The queue implements
//! [`sitehub_core::traits::jobs::JobMonitor`] so the background reaper can
//! abandon a stalled job and advance to the next one.

pub mod queue;

pub use queue::ReportJobQueue;
