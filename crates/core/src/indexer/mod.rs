//! Search provider abstraction.
//!
//! An [`Indexer`] normalizes one search provider into `test_connection`,
//! `search` and `get_capabilities`. Every implementation returns the same
//! [`SearchResult`] shape and maps its native failures onto [`IndexerError`].
//!
//! Requests to a provider go through the shared [`RateLimiterPool`], which
//! spaces requests per provider identity, backs off on transient failures and
//! enforces a request budget per search call.

mod config;
mod jackett;
mod rate_limiter;
mod registry;
mod types;

pub use config::{IndexerConfig, IndexerKind};
pub use jackett::JackettIndexer;
pub use rate_limiter::{RateLimitPolicy, RateLimiterPool, RequestBudget};
pub use registry::{IndexerRegistry, RegisteredIndexer};
pub use types::*;
