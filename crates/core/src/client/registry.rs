use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use super::{
    ClientConfig, ClientError, ClientInfo, ClientKind, DownloadClient, QBittorrentClient,
    TransmissionClient,
};

/// A client instance with its registry settings.
#[derive(Clone)]
pub struct RegisteredClient {
    pub client: Arc<dyn DownloadClient>,
    pub enabled: bool,
    pub priority: i32,
}

/// All configured transfer clients.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    entries: Vec<RegisteredClient>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(configs: &[ClientConfig]) -> Result<Self, ClientError> {
        let mut registry = Self::new();
        for config in configs {
            let client: Arc<dyn DownloadClient> = match config.kind {
                ClientKind::Qbittorrent => Arc::new(QBittorrentClient::new(config.clone())?),
                ClientKind::Transmission => Arc::new(TransmissionClient::new(config.clone())?),
            };
            info!(
                client = %config.name,
                kind = client.kind(),
                enabled = config.enabled,
                "Registered download client"
            );
            registry.register(client, config.enabled, config.priority);
        }
        Ok(registry)
    }

    pub fn register(&mut self, client: Arc<dyn DownloadClient>, enabled: bool, priority: i32) {
        self.entries.push(RegisteredClient {
            client,
            enabled,
            priority,
        });
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DownloadClient>> {
        self.entries
            .iter()
            .find(|e| e.client.name() == name)
            .map(|e| Arc::clone(&e.client))
    }

    /// Enabled clients, highest priority first.
    pub fn enabled(&self) -> Vec<RegisteredClient> {
        let mut enabled: Vec<_> = self.entries.iter().filter(|e| e.enabled).cloned().collect();
        enabled.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.client.name().cmp(b.client.name()))
        });
        enabled
    }

    /// The pinned client if named (enabled or not), otherwise the
    /// highest-priority enabled one.
    pub fn select(&self, pinned: Option<&str>) -> Result<Arc<dyn DownloadClient>, ClientError> {
        match pinned {
            Some(name) => self
                .get(name)
                .ok_or_else(|| ClientError::NotFound(format!("client '{}'", name))),
            None => self
                .enabled()
                .into_iter()
                .next()
                .map(|e| e.client)
                .ok_or_else(|| ClientError::NotFound("no enabled client".to_string())),
        }
    }

    pub fn all(&self) -> &[RegisteredClient] {
        &self.entries
    }

    /// Probe every registered client concurrently.
    pub async fn test_all(&self) -> Vec<(String, Result<ClientInfo, ClientError>)> {
        let probes = self.entries.iter().map(|e| {
            let client = Arc::clone(&e.client);
            async move { (client.name().to_string(), client.test_connection().await) }
        });
        join_all(probes).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
