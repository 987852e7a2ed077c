//! Multi-provider search.
//!
//! The [`SearchAggregator`] fans one query out to every enabled indexer,
//! each bounded by its own timeout, and returns a deduplicated, filtered and
//! ranked list. A failing provider only shows up in `indexer_errors`.

mod aggregator;
mod config;
mod dedup;
mod ranking;

pub use aggregator::{AggregateResult, SearchAggregator, SearchError, SearchRequest};
pub use config::SearchConfig;
pub use dedup::{dedupe_key, deduplicate};
pub use ranking::{rank, QualityScorer};
