use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::batch::BatchConfig;
use crate::client::{ClientConfig, ClientKind};
use crate::import::ImportConfig;
use crate::indexer::{IndexerConfig, IndexerKind};
use crate::monitor::MonitorConfig;
use crate::search::SearchConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub indexers: Vec<IndexerConfig>,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    #[serde(default)]
    pub monitor: MonitorConfig,
    pub import: ImportConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Buffered domain events per subscriber before the slowest lags.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

fn default_event_capacity() -> usize {
    256
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file shared by the ledger and the library.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("grabarr.db")
}

/// Metadata source configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetadataConfig {
    /// JSON catalog loaded into the in-memory provider. Empty catalog when
    /// unset.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub indexers: Vec<SanitizedIndexerConfig>,
    pub clients: Vec<SanitizedClientConfig>,
    pub monitor: MonitorConfig,
    pub import: ImportConfig,
    pub batch: BatchConfig,
    pub metadata: MetadataConfig,
}

/// Indexer config with the API key hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedIndexerConfig {
    #[serde(rename = "type")]
    pub kind: IndexerKind,
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub endpoint: String,
    pub indexer: String,
    pub api_key_configured: bool,
    pub min_interval_ms: u64,
    pub request_budget: u32,
    pub timeout_secs: u64,
    pub categories: Vec<u32>,
}

/// Client config with the password hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedClientConfig {
    #[serde(rename = "type")]
    pub kind: ClientKind,
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub host: String,
    pub port: u16,
    pub tls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl From<&IndexerConfig> for SanitizedIndexerConfig {
    fn from(config: &IndexerConfig) -> Self {
        Self {
            kind: config.kind,
            name: config.name.clone(),
            enabled: config.enabled,
            priority: config.priority,
            endpoint: config.endpoint.clone(),
            indexer: config.indexer.clone(),
            api_key_configured: config.api_key.as_ref().is_some_and(|k| !k.is_empty()),
            min_interval_ms: config.min_interval_ms,
            request_budget: config.request_budget,
            timeout_secs: config.timeout_secs,
            categories: config.categories.clone(),
        }
    }
}

impl From<&ClientConfig> for SanitizedClientConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            kind: config.kind,
            name: config.name.clone(),
            enabled: config.enabled,
            priority: config.priority,
            host: config.host.clone(),
            port: config.port,
            tls: config.tls,
            username: config.username.clone(),
            password_configured: config.password.as_ref().is_some_and(|p| !p.is_empty()),
            save_dir: config.save_dir.clone(),
            category: config.category.clone(),
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            search: config.search.clone(),
            indexers: config.indexers.iter().map(Into::into).collect(),
            clients: config.clients.iter().map(Into::into).collect(),
            monitor: config.monitor.clone(),
            import: config.import.clone(),
            batch: config.batch.clone(),
            metadata: config.metadata.clone(),
        }
    }
}
