//! Session registry configuration.

use serde::{Deserialize, Serialize};

/// Session registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Default maximum inactive interval in seconds before a session is
    /// considered expired. Individual sessions may carry a shorter value
    /// taken from the underlying transport session.
    #[serde(default = "default_max_inactive_interval")]
    pub max_inactive_interval_seconds: u64,
    /// Whether per-request phase timing diagnostics are collected.
    #[serde(default)]
    pub request_statistics: bool,
    /// Optional message pushed to a user's broadcast queue on login.
    #[serde(default)]
    pub login_message: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_inactive_interval_seconds: default_max_inactive_interval(),
            request_statistics: false,
            login_message: None,
        }
    }
}

fn default_max_inactive_interval() -> u64 {
    1800
}
