//! qBittorrent Web API v2 client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::fetch::{prepare, torrent_fetcher};
use super::{
    AddInput, AddOptions, ClientConfig, ClientError, ClientId, ClientInfo, ClientState,
    ClientStatusSnapshot, DownloadClient, ListOptions,
};

pub struct QBittorrentClient {
    client: Client,
    fetcher: Client,
    config: ClientConfig,
    base_url: String,
    /// Whether the cookie jar currently holds a session.
    session: RwLock<bool>,
}

impl QBittorrentClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

        let base_url = match &config.path {
            Some(path) => format!("{}{}", config.base_url(), path.trim_end_matches('/')),
            None => config.base_url(),
        };

        Ok(Self {
            client,
            fetcher: torrent_fetcher(timeout)?,
            base_url,
            config,
            session: RwLock::new(false),
        })
    }

    async fn login(&self) -> Result<(), ClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url);
        let params = [
            ("username", self.config.username.as_deref().unwrap_or_default()),
            ("password", self.config.password.as_deref().unwrap_or_default()),
        ];

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::REFERER, &self.base_url)
            .form(&params)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::FORBIDDEN {
            return Err(ClientError::AuthFailed(
                "too many failed login attempts".to_string(),
            ));
        }
        if body.trim() == "Ok." {
            debug!(client = %self.config.name, "qBittorrent login successful");
            *self.session.write().await = true;
            Ok(())
        } else if body.contains("Fails.") {
            Err(ClientError::AuthFailed("invalid credentials".to_string()))
        } else {
            Err(ClientError::AuthFailed(format!(
                "unexpected login response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), ClientError> {
        let logged_in = *self.session.read().await;
        if logged_in {
            return Ok(());
        }
        self.login().await
    }

    /// Send an authenticated request, logging in again once if the session
    /// expired.
    async fn request<F>(&self, build: F) -> Result<String, ClientError>
    where
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        self.ensure_authenticated().await?;

        let mut response = build(&self.client, &self.base_url)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        if response.status() == StatusCode::FORBIDDEN {
            warn!(client = %self.config.name, "qBittorrent session expired, re-authenticating");
            *self.session.write().await = false;
            self.login().await?;
            response = build(&self.client, &self.base_url)
                .send()
                .await
                .map_err(ClientError::from_reqwest)?;
        }

        let status = response.status();
        match status {
            StatusCode::FORBIDDEN => Err(ClientError::AuthFailed("HTTP 403".to_string())),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(response.url().path().to_string())),
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::InvalidResponse(format!(
                    "HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                )))
            }
            _ => response.text().await.map_err(ClientError::from_reqwest),
        }
    }

    async fn post_hashes(&self, endpoint: &str, id: &str) -> Result<(), ClientError> {
        let hashes = id.to_lowercase();
        self.request(|client, base| {
            client
                .post(format!("{}{}", base, endpoint))
                .form(&[("hashes", hashes.as_str())])
        })
        .await
        .map(|_| ())
    }

    /// qBittorrent 5 renamed pause/resume to stop/start.
    async fn post_hashes_with_fallback(
        &self,
        endpoint: &str,
        fallback: &str,
        id: &str,
    ) -> Result<(), ClientError> {
        match self.post_hashes(endpoint, id).await {
            Err(ClientError::NotFound(_)) => self.post_hashes(fallback, id).await,
            other => other,
        }
    }

    async fn fetch_info(&self, query: &[(&str, String)]) -> Result<Vec<ClientStatusSnapshot>, ClientError> {
        let body = self
            .request(|client, base| {
                client
                    .get(format!("{}/api/v2/torrents/info", base))
                    .query(query)
            })
            .await?;
        let torrents: Vec<QbTorrent> = serde_json::from_str(&body)
            .map_err(|e| ClientError::InvalidResponse(format!("Failed to parse response: {}", e)))?;
        Ok(torrents.into_iter().map(QbTorrent::into_snapshot).collect())
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> &'static str {
        "qbittorrent"
    }

    async fn test_connection(&self) -> Result<ClientInfo, ClientError> {
        let version = self
            .request(|client, base| client.get(format!("{}/api/v2/app/version", base)))
            .await?;
        Ok(ClientInfo {
            name: self.config.name.clone(),
            kind: self.kind().to_string(),
            version: Some(version.trim().to_string()),
        })
    }

    async fn add(&self, input: AddInput, opts: &AddOptions) -> Result<ClientId, ClientError> {
        let (input, id) = prepare(&self.fetcher, input).await?;
        let save_dir = opts.save_dir.clone().or_else(|| self.config.save_dir.clone());
        let category = opts.category.clone().or_else(|| self.config.category.clone());

        let body = self
            .request(|client, base| {
                let mut form = match &input {
                    AddInput::Magnet(uri) | AddInput::Url(uri) => Form::new().text("urls", uri.clone()),
                    AddInput::TorrentFile { data, filename } => {
                        let part = Part::bytes(data.clone()).file_name(
                            filename.clone().unwrap_or_else(|| format!("{}.torrent", id)),
                        );
                        Form::new().part("torrents", part)
                    }
                };
                if let Some(dir) = &save_dir {
                    form = form.text("savepath", dir.clone());
                }
                if let Some(cat) = &category {
                    form = form.text("category", cat.clone());
                }
                if opts.paused {
                    form = form.text("paused", "true").text("stopped", "true");
                }
                client
                    .post(format!("{}/api/v2/torrents/add", base))
                    .multipart(form)
            })
            .await?;

        if body.contains("Fails.") {
            // Older versions answer "Fails." for duplicates.
            return match self.get_status(&id).await {
                Ok(_) => Ok(id),
                Err(_) => Err(ClientError::InvalidInput(
                    "qBittorrent rejected the torrent".to_string(),
                )),
            };
        }

        debug!(client = %self.config.name, id = %id, "Transfer added");
        Ok(id)
    }

    async fn get_status(&self, id: &str) -> Result<ClientStatusSnapshot, ClientError> {
        self.fetch_info(&[("hashes", id.to_lowercase())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn list(&self, opts: &ListOptions) -> Result<Vec<ClientStatusSnapshot>, ClientError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(ids) = &opts.ids {
            let joined: Vec<String> = ids.iter().map(|id| id.to_lowercase()).collect();
            query.push(("hashes", joined.join("|")));
        }
        if let Some(category) = &opts.category {
            query.push(("category", category.clone()));
        }
        self.fetch_info(&query).await
    }

    async fn remove(&self, id: &str, delete_data: bool) -> Result<(), ClientError> {
        let hashes = id.to_lowercase();
        let delete = if delete_data { "true" } else { "false" };
        self.request(|client, base| {
            client
                .post(format!("{}/api/v2/torrents/delete", base))
                .form(&[("hashes", hashes.as_str()), ("deleteFiles", delete)])
        })
        .await
        .map(|_| ())
    }

    async fn pause(&self, id: &str) -> Result<(), ClientError> {
        self.post_hashes_with_fallback("/api/v2/torrents/pause", "/api/v2/torrents/stop", id)
            .await
    }

    async fn resume(&self, id: &str) -> Result<(), ClientError> {
        self.post_hashes_with_fallback("/api/v2/torrents/resume", "/api/v2/torrents/start", id)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct QbTorrent {
    hash: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    completed: i64,
    #[serde(default)]
    dlspeed: i64,
    #[serde(default)]
    upspeed: i64,
    #[serde(default)]
    added_on: i64,
    #[serde(default)]
    completion_on: i64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    content_path: String,
}

impl QbTorrent {
    fn into_snapshot(self) -> ClientStatusSnapshot {
        let state = parse_qb_state(&self.state);
        ClientStatusSnapshot {
            id: self.hash.to_lowercase(),
            error: (state == ClientState::Error)
                .then(|| format!("qBittorrent reported state '{}'", self.state)),
            name: self.name,
            state,
            progress: self.progress,
            download_rate: self.dlspeed.max(0) as u64,
            upload_rate: self.upspeed.max(0) as u64,
            bytes_done: self.completed.max(0) as u64,
            bytes_total: self.size.max(0) as u64,
            save_path: non_empty(self.save_path),
            content_path: non_empty(self.content_path),
            added_at: timestamp_to_datetime(self.added_on),
            completed_at: timestamp_to_datetime(self.completion_on),
        }
    }
}

fn parse_qb_state(state: &str) -> ClientState {
    match state {
        "downloading" | "forcedDL" | "metaDL" | "forcedMetaDL" | "allocating" | "stalledDL" => {
            ClientState::Transferring
        }
        "uploading" | "forcedUP" | "stalledUP" | "queuedUP" => ClientState::Seeding,
        "pausedUP" | "stoppedUP" => ClientState::Done,
        "pausedDL" | "stoppedDL" => ClientState::Paused,
        "error" | "missingFiles" => ClientState::Error,
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

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}
