use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    Qbittorrent,
    Transmission,
}

/// One configured transfer client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(rename = "type")]
    pub kind: ClientKind,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Highest priority wins when no client is pinned.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    /// Path prefix, e.g. "/transmission/rpc" or a reverse-proxy base.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Default save directory for new transfers.
    #[serde(default)]
    pub save_dir: Option<String>,
    /// Category (qBittorrent) or label (Transmission) for new transfers.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ClientConfig {
    /// Scheme, host and port without a trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
