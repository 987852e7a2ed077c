//! Monitor configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Run the poll loop at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time between polls (milliseconds). Also the minimum gap between the
    /// two unseen polls that mark a record `missing`.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Clients polled at the same time.
    #[serde(default = "default_max_concurrent_polls")]
    pub max_concurrent_polls: usize,

    /// Upper bound for one client's `list` call (seconds).
    #[serde(default = "default_client_timeout")]
    pub client_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    5000 // 5 seconds
}

fn default_max_concurrent_polls() -> usize {
    4
}

fn default_client_timeout() -> u64 {
    30
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval(),
            max_concurrent_polls: default_max_concurrent_polls(),
            client_timeout_secs: default_client_timeout(),
        }
    }
}
