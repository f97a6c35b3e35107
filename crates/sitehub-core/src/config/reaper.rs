//! Background reaper configuration.

use serde::{Deserialize, Serialize};

/// Background reaper configuration.
///
/// The reaper wakes once per `wake_interval_seconds`. Session sweeps and
/// persistence run every `maintenance_ratio`-th wake, the stalled-job check
/// every `2 * maintenance_ratio`-th wake, and a running job counts as
/// stalled once its worker has been silent for `maintenance_ratio` wake
/// intervals. The three cadences are deliberately coupled to this single
/// value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Whether the background reaper is started at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Length of one wake interval in seconds.
    #[serde(default = "default_wake_interval")]
    pub wake_interval_seconds: u64,
    /// Number of wakes between maintenance passes.
    #[serde(default = "default_maintenance_ratio")]
    pub maintenance_ratio: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wake_interval_seconds: default_wake_interval(),
            maintenance_ratio: default_maintenance_ratio(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_wake_interval() -> u64 {
    60
}

fn default_maintenance_ratio() -> u64 {
    5
}
