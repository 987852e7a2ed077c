use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::indexer::{IndexerRegistry, MediaType, SearchOptions, SearchResult};
use crate::metrics;

use super::{deduplicate, rank, QualityScorer, SearchConfig};

/// One aggregated search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub min_seeders: u32,
    #[serde(default = "default_dedupe")]
    pub dedupe: bool,
    #[serde(default)]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub page: u32,
}

fn default_dedupe() -> bool {
    true
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            min_seeders: 0,
            dedupe: true,
            media_type: None,
            page: 0,
        }
    }

    pub fn with_min_seeders(mut self, min_seeders: u32) -> Self {
        self.min_seeders = min_seeders;
        self
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn without_dedupe(mut self) -> Self {
        self.dedupe = false;
        self
    }
}

/// Ranked results plus the providers that did not answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    pub query: String,
    pub results: Vec<SearchResult>,
    /// Provider name -> error message.
    pub indexer_errors: BTreeMap<String, String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("No enabled indexers")]
    NoEnabledIndexers,

    #[error("All indexers failed: {0:?}")]
    AllIndexersFailed(BTreeMap<String, String>),
}

/// Fans a query out to every enabled indexer.
pub struct SearchAggregator {
    registry: IndexerRegistry,
    config: SearchConfig,
    scorer: QualityScorer,
}

impl SearchAggregator {
    pub fn new(registry: IndexerRegistry, config: SearchConfig) -> Self {
        let scorer = QualityScorer::from_config(&config);
        Self {
            registry,
            config,
            scorer,
        }
    }

    pub fn registry(&self) -> &IndexerRegistry {
        &self.registry
    }

    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<AggregateResult, SearchError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery("query is empty".to_string()));
        }

        let indexers = self.registry.enabled();
        if indexers.is_empty() {
            return Err(SearchError::NoEnabledIndexers);
        }

        let start = Instant::now();
        let timeout = Duration::from_millis(self.config.indexer_timeout_ms);
        let min_seeders = request.min_seeders.max(self.config.min_seeders);
        let opts = SearchOptions {
            media_type: request.media_type,
            min_seeders,
            page: request.page,
        };
        let indexer_count = indexers.len();

        debug!(query = %query, indexers = indexer_count, "Starting aggregated search");

        let outcomes: Vec<(String, Result<Vec<SearchResult>, String>)> = stream::iter(indexers)
            .map(|entry| {
                let opts = opts.clone();
                async move {
                    let name = entry.indexer.name().to_string();
                    let outcome =
                        match tokio::time::timeout(timeout, entry.indexer.search(query, &opts)).await
                        {
                            Ok(Ok(results)) => Ok(results),
                            Ok(Err(e)) => Err(e.to_string()),
                            Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
                        };
                    (name, outcome)
                }
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut collected: Vec<SearchResult> = Vec::new();
        let mut indexer_errors: BTreeMap<String, String> = BTreeMap::new();

        for (name, outcome) in outcomes {
            match outcome {
                Ok(mut results) => {
                    debug!(indexer = %name, results = results.len(), "Indexer answered");
                    collected.append(&mut results);
                }
                Err(error) => {
                    warn!(indexer = %name, error = %error, "Indexer search failed");
                    metrics::INDEXER_FAILURES.with_label_values(&[name.as_str()]).inc();
                    indexer_errors.insert(name, error);
                }
            }
        }

        if indexer_errors.len() == indexer_count {
            metrics::SEARCHES.with_label_values(&["failed"]).inc();
            return Err(SearchError::AllIndexersFailed(indexer_errors));
        }

        let mut results = if request.dedupe {
            deduplicate(collected)
        } else {
            collected
        };
        results.retain(|r| r.seeders >= min_seeders);
        rank(&mut results, &self.scorer);

        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = if indexer_errors.is_empty() {
            "ok"
        } else {
            "partial"
        };
        metrics::SEARCHES.with_label_values(&[outcome]).inc();
        metrics::SEARCH_DURATION.observe(duration_ms as f64 / 1000.0);
        metrics::SEARCH_RESULTS.observe(results.len() as f64);

        info!(
            query = %query,
            results = results.len(),
            failed_indexers = indexer_errors.len(),
            duration_ms = duration_ms,
            "Search complete"
        );

        Ok(AggregateResult {
            query: query.to_string(),
            results,
            indexer_errors,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::IndexerError;
    use crate::testing::fixtures::result;
    use crate::testing::{ConcurrencyProbe, MockIndexer};
    use std::sync::Arc;

    fn registry(indexers: Vec<MockIndexer>) -> IndexerRegistry {
        let mut registry = IndexerRegistry::new();
        for indexer in indexers {
            registry.register(Arc::new(indexer), true, 0);
        }
        registry
    }

    fn fast_config() -> SearchConfig {
        SearchConfig {
            indexer_timeout_ms: 100,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let aggregator = SearchAggregator::new(registry(vec![MockIndexer::new("a")]), fast_config());
        let err = aggregator.search(&SearchRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_no_enabled_indexers() {
        let mut reg = IndexerRegistry::new();
        reg.register(Arc::new(MockIndexer::new("off")), false, 0);
        let aggregator = SearchAggregator::new(reg, fast_config());
        let err = aggregator.search(&SearchRequest::new("show")).await.unwrap_err();
        assert_eq!(err, SearchError::NoEnabledIndexers);
    }

    #[tokio::test]
    async fn test_all_failed_is_error() {
        let a = MockIndexer::new("a");
        a.set_error(IndexerError::AuthFailed("bad key".into()));
        let b = MockIndexer::new("b");
        b.set_error(IndexerError::Timeout);

        let aggregator = SearchAggregator::new(registry(vec![a, b]), fast_config());
        match aggregator.search(&SearchRequest::new("show")).await {
            Err(SearchError::AllIndexersFailed(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors["a"].contains("bad key"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_min_seeders_filter() {
        let a = MockIndexer::new("a").with_results(vec![
            result("One.1080p", 0),
            result("Two.1080p", 4),
            result("Three.1080p", 5),
        ]);
        let aggregator = SearchAggregator::new(registry(vec![a]), fast_config());
        let out = aggregator
            .search(&SearchRequest::new("x").with_min_seeders(4))
            .await
            .unwrap();
        assert_eq!(out.results.len(), 2);
        assert!(out.results.iter().all(|r| r.seeders >= 4));
    }

    #[tokio::test]
    async fn test_dedupe_flag() {
        let mut dup = result("Same.1080p", 3);
        dup.info_hash = Some("h".into());
        let a = MockIndexer::new("a").with_results(vec![dup.clone()]);
        let b = MockIndexer::new("b").with_results(vec![dup]);

        let aggregator = SearchAggregator::new(registry(vec![a, b]), fast_config());
        let deduped = aggregator.search(&SearchRequest::new("x")).await.unwrap();
        assert_eq!(deduped.results.len(), 1);

        let raw = aggregator
            .search(&SearchRequest::new("x").without_dedupe())
            .await
            .unwrap();
        assert_eq!(raw.results.len(), 2);
    }

    #[tokio::test]
    async fn test_slow_indexer_is_time_boxed() {
        let fast = MockIndexer::new("fast").with_results(vec![result("Fast.720p", 1)]);
        let slow = MockIndexer::new("slow")
            .with_results(vec![result("Slow.1080p", 1)])
            .with_delay(Duration::from_secs(5));

        let aggregator = SearchAggregator::new(registry(vec![fast, slow]), fast_config());
        let start = Instant::now();
        let out = aggregator.search(&SearchRequest::new("x")).await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(out.results.len(), 1);
        assert!(out.indexer_errors["slow"].contains("timed out"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let probe = ConcurrencyProbe::default();
        let indexers: Vec<_> = (0..6)
            .map(|i| {
                MockIndexer::new(&format!("idx{}", i))
                    .with_results(vec![result(&format!("R{}.720p", i), 1)])
                    .with_delay(Duration::from_millis(50))
                    .with_probe(probe.clone())
            })
            .collect();

        let config = SearchConfig {
            max_concurrency: 2,
            indexer_timeout_ms: 1_000,
            ..Default::default()
        };
        let aggregator = SearchAggregator::new(registry(indexers), config);
        let out = aggregator.search(&SearchRequest::new("x")).await.unwrap();

        assert_eq!(out.results.len(), 6);
        let peak = probe.peak();
        assert!(peak <= 2, "peak concurrency was {}", peak);
    }
}
