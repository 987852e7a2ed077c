use std::sync::Arc;

use tracing::info;

use super::{Indexer, IndexerConfig, IndexerError, IndexerKind, JackettIndexer, RateLimiterPool};

/// An indexer instance with its registry settings.
#[derive(Clone)]
pub struct RegisteredIndexer {
    pub indexer: Arc<dyn Indexer>,
    pub enabled: bool,
    pub priority: i32,
}

/// All configured search providers, built once at startup.
#[derive(Clone, Default)]
pub struct IndexerRegistry {
    entries: Vec<RegisteredIndexer>,
}

impl IndexerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate one adapter per config entry according to its `type`.
    pub fn from_config(
        configs: &[IndexerConfig],
        limiter: Arc<RateLimiterPool>,
    ) -> Result<Self, IndexerError> {
        let mut registry = Self::new();
        for config in configs {
            let indexer: Arc<dyn Indexer> = match config.kind {
                IndexerKind::Jackett => {
                    Arc::new(JackettIndexer::new(config.clone(), Arc::clone(&limiter))?)
                }
            };
            info!(
                indexer = %config.name,
                kind = indexer.kind(),
                enabled = config.enabled,
                "Registered indexer"
            );
            registry.register(indexer, config.enabled, config.priority);
        }
        Ok(registry)
    }

    pub fn register(&mut self, indexer: Arc<dyn Indexer>, enabled: bool, priority: i32) {
        self.entries.push(RegisteredIndexer {
            indexer,
            enabled,
            priority,
        });
    }

    /// Enabled indexers, highest priority first.
    pub fn enabled(&self) -> Vec<RegisteredIndexer> {
        let mut enabled: Vec<_> = self.entries.iter().filter(|e| e.enabled).cloned().collect();
        enabled.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.indexer.name().cmp(b.indexer.name()))
        });
        enabled
    }

    pub fn all(&self) -> &[RegisteredIndexer] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredIndexer> {
        self.entries.iter().find(|e| e.indexer.name() == name)
    }

    pub fn priority_of(&self, name: &str) -> i32 {
        self.get(name).map(|e| e.priority).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
