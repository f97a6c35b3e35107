//! Durable storage configuration.

use serde::{Deserialize, Serialize};

/// Durable storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for persisted state (lock table, audit log).
    #[serde(default = "default_data_root")]
    pub data_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
        }
    }
}

fn default_data_root() -> String {
    "data".to_string()
}
