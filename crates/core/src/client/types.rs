use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Client-assigned transfer identifier (lowercase info hash for torrents).
pub type ClientId = String;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Transfer not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request timed out")]
    Timeout,
}

impl ClientError {
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::ConnectionFailed(_) | ClientError::Timeout => "connection_failed",
            ClientError::AuthFailed(_) => "auth_failed",
            ClientError::RateLimited(_) => "rate_limited",
            ClientError::NotFound(_) => "not_found",
            ClientError::InvalidResponse(_) | ClientError::InvalidInput(_) => "invalid_response",
        }
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_connect() {
            ClientError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            ClientError::InvalidResponse(e.to_string())
        } else {
            ClientError::ConnectionFailed(e.to_string())
        }
    }
}

/// Shared transfer state vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    Queued,
    Transferring,
    Seeding,
    Paused,
    Error,
    Done,
}

impl ClientState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientState::Queued => "queued",
            ClientState::Transferring => "transferring",
            ClientState::Seeding => "seeding",
            ClientState::Paused => "paused",
            ClientState::Error => "error",
            ClientState::Done => "done",
        }
    }
}

/// Live status of one transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientStatusSnapshot {
    pub id: ClientId,
    pub name: String,
    pub state: ClientState,
    /// 0.0 - 1.0
    pub progress: f64,
    /// Bytes per second.
    pub download_rate: u64,
    pub upload_rate: u64,
    pub bytes_done: u64,
    pub bytes_total: u64,
    /// Directory the client saves into.
    pub save_path: Option<String>,
    /// Path of the transfer's content (file or top directory), when known.
    pub content_path: Option<String>,
    pub added_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Client-reported error text when `state` is `Error`.
    pub error: Option<String>,
}

impl ClientStatusSnapshot {
    /// Fully transferred: progress reached 100% or the client says so.
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0 || matches!(self.state, ClientState::Seeding | ClientState::Done)
    }
}

/// What to hand to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddInput {
    Magnet(String),
    TorrentFile {
        data: Vec<u8>,
        filename: Option<String>,
    },
    Url(String),
}

impl AddInput {
    /// Classify a search result's acquisition reference.
    pub fn from_reference(reference: &str) -> Self {
        if reference.starts_with("magnet:") {
            AddInput::Magnet(reference.to_string())
        } else {
            AddInput::Url(reference.to_string())
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddOptions {
    /// Overrides the client's configured save directory.
    pub save_dir: Option<String>,
    /// Overrides the client's configured category/label.
    pub category: Option<String>,
    pub paused: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOptions {
    /// Only these ids.
    pub ids: Option<Vec<ClientId>>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub kind: String,
    pub version: Option<String>,
}

/// A transfer backend.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Configured instance name.
    fn name(&self) -> &str;

    /// Implementation type, e.g. "qbittorrent".
    fn kind(&self) -> &'static str;

    async fn test_connection(&self) -> Result<ClientInfo, ClientError>;

    /// Start a transfer and return the id the client tracks it under.
    async fn add(&self, input: AddInput, opts: &AddOptions) -> Result<ClientId, ClientError>;

    /// `ClientError::NotFound` when the client has no such transfer.
    async fn get_status(&self, id: &str) -> Result<ClientStatusSnapshot, ClientError>;

    async fn list(&self, opts: &ListOptions) -> Result<Vec<ClientStatusSnapshot>, ClientError>;

    async fn remove(&self, id: &str, delete_data: bool) -> Result<(), ClientError>;

    async fn pause(&self, id: &str) -> Result<(), ClientError>;

    async fn resume(&self, id: &str) -> Result<(), ClientError>;
}
