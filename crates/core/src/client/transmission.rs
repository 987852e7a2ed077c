//! Transmission RPC client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::fetch::{prepare, torrent_fetcher};
use super::{
    AddInput, AddOptions, ClientConfig, ClientError, ClientId, ClientInfo, ClientState,
    ClientStatusSnapshot, DownloadClient, ListOptions,
};

const SESSION_HEADER: &str = "X-Transmission-Session-Id";
const DEFAULT_RPC_PATH: &str = "/transmission/rpc";

const TORRENT_FIELDS: &[&str] = &[
    "hashString",
    "name",
    "status",
    "percentDone",
    "rateDownload",
    "rateUpload",
    "sizeWhenDone",
    "leftUntilDone",
    "downloadDir",
    "addedDate",
    "doneDate",
    "error",
    "errorString",
    "labels",
];

pub struct TransmissionClient {
    client: Client,
    fetcher: Client,
    config: ClientConfig,
    rpc_url: String,
    /// CSRF token handed out on the first 409.
    session_id: RwLock<Option<String>>,
}

impl TransmissionClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        let rpc_url = format!(
            "{}{}",
            config.base_url(),
            config.path.as_deref().unwrap_or(DEFAULT_RPC_PATH)
        );

        Ok(Self {
            client,
            fetcher: torrent_fetcher(timeout)?,
            rpc_url,
            config,
            session_id: RwLock::new(None),
        })
    }

    async fn rpc(&self, method: &str, arguments: Value) -> Result<Value, ClientError> {
        let body = json!({ "method": method, "arguments": arguments });

        for attempt in 0..2 {
            let session = self.session_id.read().await.clone();
            let mut request = self.client.post(&self.rpc_url).json(&body);
            if let Some(id) = session {
                request = request.header(SESSION_HEADER, id);
            }
            if let Some(user) = &self.config.username {
                request = request.basic_auth(user, self.config.password.as_ref());
            }

            let response = request.send().await.map_err(ClientError::from_reqwest)?;
            let status = response.status();
            match status {
                StatusCode::CONFLICT if attempt == 0 => {
                    let id = response
                        .headers()
                        .get(SESSION_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string)
                        .ok_or_else(|| {
                            ClientError::InvalidResponse("409 without a session id".to_string())
                        })?;
                    debug!(client = %self.config.name, "Transmission session id refreshed");
                    *self.session_id.write().await = Some(id);
                    continue;
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(ClientError::AuthFailed(format!("HTTP {}", status)))
                }
                s if !s.is_success() => {
                    return Err(ClientError::InvalidResponse(format!("HTTP {}", status)))
                }
                _ => {}
            }

            let rpc: RpcResponse = response
                .json()
                .await
                .map_err(|e| ClientError::InvalidResponse(format!("Failed to parse response: {}", e)))?;
            return rpc.into_result();
        }

        Err(ClientError::AuthFailed("session id rejected".to_string()))
    }

    async fn torrent_get(&self, ids: Option<Vec<String>>) -> Result<Vec<TrTorrent>, ClientError> {
        let mut arguments = json!({ "fields": TORRENT_FIELDS });
        if let Some(ids) = ids {
            arguments["ids"] = json!(ids);
        }
        let result = self.rpc("torrent-get", arguments).await?;
        let torrents = result.get("torrents").cloned().unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(torrents)
            .map_err(|e| ClientError::InvalidResponse(format!("Failed to parse torrents: {}", e)))
    }

    async fn torrent_action(&self, method: &str, id: &str) -> Result<(), ClientError> {
        self.rpc(method, json!({ "ids": [id.to_lowercase()] }))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl DownloadClient for TransmissionClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> &'static str {
        "transmission"
    }

    async fn test_connection(&self) -> Result<ClientInfo, ClientError> {
        let result = self
            .rpc("session-get", json!({ "fields": ["version"] }))
            .await?;
        Ok(ClientInfo {
            name: self.config.name.clone(),
            kind: self.kind().to_string(),
            version: result
                .get("version")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    async fn add(&self, input: AddInput, opts: &AddOptions) -> Result<ClientId, ClientError> {
        let (input, id) = prepare(&self.fetcher, input).await?;

        let mut arguments = match &input {
            AddInput::Magnet(uri) | AddInput::Url(uri) => json!({ "filename": uri }),
            AddInput::TorrentFile { data, .. } => json!({ "metainfo": base64_encode(data) }),
        };
        if let Some(dir) = opts.save_dir.as_ref().or(self.config.save_dir.as_ref()) {
            arguments["download-dir"] = json!(dir);
        }
        if let Some(label) = opts.category.as_ref().or(self.config.category.as_ref()) {
            arguments["labels"] = json!([label]);
        }
        if opts.paused {
            arguments["paused"] = json!(true);
        }

        let result = self.rpc("torrent-add", arguments).await?;
        let added = result
            .get("torrent-added")
            .or_else(|| result.get("torrent-duplicate"))
            .and_then(|t| t.get("hashString"))
            .and_then(Value::as_str)
            .map(str::to_lowercase)
            .unwrap_or(id);

        debug!(client = %self.config.name, id = %added, "Transfer added");
        Ok(added)
    }

    async fn get_status(&self, id: &str) -> Result<ClientStatusSnapshot, ClientError> {
        self.torrent_get(Some(vec![id.to_lowercase()]))
            .await?
            .into_iter()
            .next()
            .map(TrTorrent::into_snapshot)
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn list(&self, opts: &ListOptions) -> Result<Vec<ClientStatusSnapshot>, ClientError> {
        let ids = opts
            .ids
            .as_ref()
            .map(|ids| ids.iter().map(|id| id.to_lowercase()).collect());
        let torrents = self.torrent_get(ids).await?;
        Ok(torrents
            .into_iter()
            .filter(|t| match &opts.category {
                Some(label) => t.labels.iter().any(|l| l == label),
                None => true,
            })
            .map(TrTorrent::into_snapshot)
            .collect())
    }

    async fn remove(&self, id: &str, delete_data: bool) -> Result<(), ClientError> {
        self.rpc(
            "torrent-remove",
            json!({ "ids": [id.to_lowercase()], "delete-local-data": delete_data }),
        )
        .await
        .map(|_| ())
    }

    async fn pause(&self, id: &str) -> Result<(), ClientError> {
        self.torrent_action("torrent-stop", id).await
    }

    async fn resume(&self, id: &str) -> Result<(), ClientError> {
        self.torrent_action("torrent-start", id).await
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

impl RpcResponse {
    fn into_result(self) -> Result<Value, ClientError> {
        match self.result.as_str() {
            "success" => Ok(self.arguments),
            r if r.contains("invalid or corrupt") || r.contains("unrecognized info") => {
                Err(ClientError::InvalidInput(self.result))
            }
            _ => Err(ClientError::InvalidResponse(self.result)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrTorrent {
    hash_string: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: i64,
    #[serde(default)]
    percent_done: f64,
    #[serde(default)]
    rate_download: i64,
    #[serde(default)]
    rate_upload: i64,
    #[serde(default)]
    size_when_done: i64,
    #[serde(default)]
    left_until_done: i64,
    #[serde(default)]
    download_dir: String,
    #[serde(default)]
    added_date: i64,
    #[serde(default)]
    done_date: i64,
    #[serde(default)]
    error: i64,
    #[serde(default)]
    error_string: String,
    #[serde(default)]
    labels: Vec<String>,
}

/// Transmission's `error` value for a local (non-tracker) failure.
const LOCAL_ERROR: i64 = 3;

impl TrTorrent {
    fn into_snapshot(self) -> ClientStatusSnapshot {
        let state = parse_tr_state(self.status, self.percent_done, self.error);
        let content_path = (!self.download_dir.is_empty() && !self.name.is_empty()).then(|| {
            format!("{}/{}", self.download_dir.trim_end_matches('/'), self.name)
        });
        ClientStatusSnapshot {
            id: self.hash_string.to_lowercase(),
            error: (state == ClientState::Error).then_some(self.error_string),
            name: self.name,
            state,
            progress: self.percent_done,
            download_rate: self.rate_download.max(0) as u64,
            upload_rate: self.rate_upload.max(0) as u64,
            bytes_done: (self.size_when_done - self.left_until_done).max(0) as u64,
            bytes_total: self.size_when_done.max(0) as u64,
            save_path: (!self.download_dir.is_empty()).then_some(self.download_dir),
            content_path,
            added_at: timestamp_to_datetime(self.added_date),
            completed_at: timestamp_to_datetime(self.done_date),
        }
    }
}

fn parse_tr_state(status: i64, percent_done: f64, error: i64) -> ClientState {
    if error == LOCAL_ERROR {
        return ClientState::Error;
    }
    match status {
        0 if percent_done >= 1.0 => ClientState::Done,
        0 => ClientState::Paused,
        4 => ClientState::Transferring,
        5 | 6 => ClientState::Seeding,
        _ => ClientState::Queued,
    }
}

fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Standard padded base64, as `torrent-add` expects for `metainfo`.
fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b = [
            chunk[0],
            chunk.get(1).copied().unwrap_or(0),
            chunk.get(2).copied().unwrap_or(0),
        ];
        let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        for i in 0..4 {
            if i <= chunk.len() {
                let idx = (n >> (18 - 6 * i)) & 0x3f;
                out.push(BASE64_ALPHABET[idx as usize] as char);
            } else {
                out.push('=');
            }
        }
    }
    out
}
