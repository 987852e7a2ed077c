//! Mock indexer for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::indexer::{
    CapabilitySet, Indexer, IndexerError, IndexerInfo, SearchOptions, SearchResult,
};

/// Tracks how many mock calls run at the same time.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock implementation of the Indexer trait.
///
/// Returns canned results (stamped with its own name), optionally after a
/// delay, or a configured error.
#[derive(Debug)]
pub struct MockIndexer {
    name: String,
    results: Vec<SearchResult>,
    delay: Option<Duration>,
    error: Mutex<Option<IndexerError>>,
    probe: Option<ConcurrencyProbe>,
    queries: Mutex<Vec<String>>,
}

impl MockIndexer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            results: Vec::new(),
            delay: None,
            error: Mutex::new(None),
            probe: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_results(mut self, results: Vec<SearchResult>) -> Self {
        self.results = results;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_probe(mut self, probe: ConcurrencyProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Every following call fails with `error`.
    pub fn set_error(&self, error: IndexerError) {
        *self.error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    /// Queries received so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn error(&self) -> Option<IndexerError> {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn test_connection(&self) -> Result<IndexerInfo, IndexerError> {
        if let Some(e) = self.error() {
            return Err(e);
        }
        Ok(IndexerInfo {
            name: self.name.clone(),
            kind: "mock".to_string(),
            message: "ok".to_string(),
        })
    }

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>, IndexerError> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.to_string());

        if let Some(probe) = &self.probe {
            probe.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(probe) = &self.probe {
            probe.exit();
        }

        if let Some(e) = self.error() {
            return Err(e);
        }

        Ok(self
            .results
            .iter()
            .filter(|r| r.seeders >= opts.min_seeders)
            .cloned()
            .map(|mut r| {
                r.indexer = self.name.clone();
                r
            })
            .collect())
    }

    async fn get_capabilities(&self) -> Result<CapabilitySet, IndexerError> {
        if let Some(e) = self.error() {
            return Err(e);
        }
        Ok(CapabilitySet {
            search: true,
            tv_search: true,
            movie_search: true,
            categories: Vec::new(),
            max_results: None,
        })
    }
}
