//! Mock transfer client for testing.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::client::{
    AddInput, AddOptions, ClientError, ClientId, ClientInfo, ClientState, ClientStatusSnapshot,
    DownloadClient, ListOptions,
};
use crate::torrent::info_hash_from_magnet;

use super::fixtures::fake_hash;

/// A recorded `add` call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAdd {
    pub input: AddInput,
    pub opts: AddOptions,
    pub id: ClientId,
}

#[derive(Debug, Default)]
struct State {
    /// Keyed by lowercase id.
    transfers: BTreeMap<String, ClientStatusSnapshot>,
    added: Vec<RecordedAdd>,
    removed: Vec<(String, bool)>,
    failure: Option<ClientError>,
    list_calls: usize,
}

/// Mock implementation of the DownloadClient trait.
///
/// Transfers live in memory and are matched case-insensitively. `add`
/// derives the id from a magnet's info hash (or a hash of the URL) and
/// registers a queued transfer under it.
#[derive(Debug)]
pub struct MockClient {
    name: String,
    save_path: String,
    state: Mutex<State>,
}

impl MockClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            save_path: "/downloads".to_string(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every following call fails with `error`.
    pub fn fail_with(&self, error: ClientError) {
        self.lock().failure = Some(error);
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    pub fn insert_transfer(&self, id: &str, name: &str, state: ClientState, progress: f64) {
        let snapshot = ClientStatusSnapshot {
            id: id.to_string(),
            name: name.to_string(),
            state,
            progress,
            download_rate: 0,
            upload_rate: 0,
            bytes_done: 0,
            bytes_total: 0,
            save_path: Some(self.save_path.clone()),
            content_path: None,
            added_at: Some(Utc::now()),
            completed_at: None,
            error: None,
        };
        self.lock().transfers.insert(id.to_lowercase(), snapshot);
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut ClientStatusSnapshot)) {
        if let Some(snapshot) = self.lock().transfers.get_mut(&id.to_lowercase()) {
            f(snapshot);
        }
    }

    pub fn set_state(&self, id: &str, state: ClientState, progress: f64) {
        self.update(id, |s| {
            s.state = state;
            s.progress = progress;
            if progress >= 1.0 {
                s.completed_at = Some(Utc::now());
            }
        });
    }

    pub fn set_content_path(&self, id: &str, path: &str) {
        let path = path.to_string();
        self.update(id, |s| s.content_path = Some(path));
    }

    /// Put the transfer into the error state with `message`.
    pub fn set_error(&self, id: &str, message: &str) {
        let message = message.to_string();
        self.update(id, |s| {
            s.state = ClientState::Error;
            s.error = Some(message);
        });
    }

    /// Drop a transfer as if removed outside the pipeline.
    pub fn remove_transfer(&self, id: &str) {
        self.lock().transfers.remove(&id.to_lowercase());
    }

    pub fn added(&self) -> Vec<RecordedAdd> {
        self.lock().added.clone()
    }

    /// `(id, delete_data)` per remove call.
    pub fn removed(&self) -> Vec<(String, bool)> {
        self.lock().removed.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    fn check(&self) -> Result<(), ClientError> {
        match &self.lock().failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DownloadClient for MockClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn test_connection(&self) -> Result<ClientInfo, ClientError> {
        self.check()?;
        Ok(ClientInfo {
            name: self.name.clone(),
            kind: "mock".to_string(),
            version: Some("1.0".to_string()),
        })
    }

    async fn add(&self, input: AddInput, opts: &AddOptions) -> Result<ClientId, ClientError> {
        self.check()?;
        let (id, name) = match &input {
            AddInput::Magnet(uri) => {
                let id = info_hash_from_magnet(uri)
                    .ok_or_else(|| ClientError::InvalidInput(format!("bad magnet: {}", uri)))?;
                (id.clone(), id)
            }
            AddInput::Url(url) => (fake_hash(url), url.clone()),
            AddInput::TorrentFile { data, filename } => (
                fake_hash(&String::from_utf8_lossy(data)),
                filename.clone().unwrap_or_default(),
            ),
        };

        let state = if opts.paused {
            ClientState::Paused
        } else {
            ClientState::Queued
        };
        self.insert_transfer(&id, &name, state, 0.0);
        self.lock().added.push(RecordedAdd {
            input,
            opts: opts.clone(),
            id: id.clone(),
        });
        Ok(id)
    }

    async fn get_status(&self, id: &str) -> Result<ClientStatusSnapshot, ClientError> {
        self.check()?;
        self.lock()
            .transfers
            .get(&id.to_lowercase())
            .cloned()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn list(&self, opts: &ListOptions) -> Result<Vec<ClientStatusSnapshot>, ClientError> {
        let mut state = self.lock();
        state.list_calls += 1;
        if let Some(e) = &state.failure {
            return Err(e.clone());
        }
        let wanted: Option<Vec<String>> = opts
            .ids
            .as_ref()
            .map(|ids| ids.iter().map(|i| i.to_lowercase()).collect());
        Ok(state
            .transfers
            .iter()
            .filter(|(key, _)| wanted.as_ref().map_or(true, |w| w.contains(key)))
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn remove(&self, id: &str, delete_data: bool) -> Result<(), ClientError> {
        self.check()?;
        let mut state = self.lock();
        state.removed.push((id.to_string(), delete_data));
        state
            .transfers
            .remove(&id.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn pause(&self, id: &str) -> Result<(), ClientError> {
        self.check()?;
        self.update(id, |s| s.state = ClientState::Paused);
        Ok(())
    }

    async fn resume(&self, id: &str) -> Result<(), ClientError> {
        self.check()?;
        self.update(id, |s| s.state = ClientState::Queued);
        Ok(())
    }
}
