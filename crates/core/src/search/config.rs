use serde::{Deserialize, Serialize};

/// Search aggregation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Maximum number of indexers queried at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Time box for a single indexer's search.
    #[serde(default = "default_indexer_timeout_ms")]
    pub indexer_timeout_ms: u64,
    #[serde(default)]
    pub min_seeders: u32,
    /// Release tags that raise a result's score (e.g. "REMUX", "NTb").
    #[serde(default)]
    pub preferred_tags: Vec<String>,
    /// Release tags that sink a result to the bottom.
    #[serde(default)]
    pub blocked_tags: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            indexer_timeout_ms: default_indexer_timeout_ms(),
            min_seeders: 0,
            preferred_tags: Vec::new(),
            blocked_tags: Vec::new(),
        }
    }
}

fn default_max_concurrency() -> usize {
    4
}

fn default_indexer_timeout_ms() -> u64 {
    20_000
}
