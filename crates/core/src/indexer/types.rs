use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::release::Quality;

/// Broad media type used to narrow a search to provider categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Tv,
    Audio,
    Book,
    Other,
}

impl MediaType {
    /// Newznab/Torznab top-level category ids.
    pub fn category_ids(&self) -> &'static [u32] {
        match self {
            MediaType::Movie => &[2000],
            MediaType::Tv => &[5000],
            MediaType::Audio => &[3000],
            MediaType::Book => &[7000],
            MediaType::Other => &[8000],
        }
    }

    /// Whether a provider category code belongs to this media type.
    pub fn contains(&self, category: u32) -> bool {
        self.category_ids()
            .iter()
            .any(|base| category >= *base && category < base + 1000)
    }
}

/// Per-call search options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default)]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub min_seeders: u32,
    /// Zero-based result page.
    #[serde(default)]
    pub page: u32,
}

/// One candidate release from one provider.
///
/// Lives only for the duration of a search call; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub size_bytes: u64,
    /// Zero for non-swarm protocols.
    pub seeders: u32,
    pub leechers: u32,
    /// Magnet URI or download URL handed to a client.
    pub reference: String,
    /// Lowercase hex info hash, when the provider exposes one.
    pub info_hash: Option<String>,
    /// Name of the provider that returned this result.
    pub indexer: String,
    pub category: Option<u32>,
    pub publish_date: Option<DateTime<Utc>>,
    pub details_url: Option<String>,
    pub quality: Quality,
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerInfo {
    pub name: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityCategory {
    pub id: u32,
    pub name: String,
}

/// What a provider supports.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilitySet {
    pub search: bool,
    pub tv_search: bool,
    pub movie_search: bool,
    pub categories: Vec<CapabilityCategory>,
    pub max_results: Option<u32>,
}

/// Failures shared by every provider implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Rate limited by {indexer}")]
    RateLimited {
        indexer: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request budget of {budget} exhausted for {indexer}")]
    BudgetExhausted { indexer: String, budget: u32 },
}

impl IndexerError {
    /// Failures worth retrying after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IndexerError::ConnectionFailed(_)
                | IndexerError::Timeout
                | IndexerError::RateLimited { .. }
        )
    }

    /// Stable snake_case code for logs and the read API.
    pub fn code(&self) -> &'static str {
        match self {
            IndexerError::ConnectionFailed(_) => "connection_failed",
            IndexerError::AuthFailed(_) => "auth_failed",
            IndexerError::RateLimited { .. } => "rate_limited",
            IndexerError::NotFound(_) => "not_found",
            IndexerError::InvalidResponse(_) => "invalid_response",
            IndexerError::Timeout => "connection_failed",
            IndexerError::BudgetExhausted { .. } => "rate_limited",
        }
    }
}

/// A search provider.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Provider identity. Also the rate limiter key.
    fn name(&self) -> &str;

    /// Implementation type, e.g. "jackett".
    fn kind(&self) -> &'static str;

    async fn test_connection(&self) -> Result<IndexerInfo, IndexerError>;

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>, IndexerError>;

    async fn get_capabilities(&self) -> Result<CapabilitySet, IndexerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_contains_subcategories() {
        assert!(MediaType::Tv.contains(5000));
        assert!(MediaType::Tv.contains(5040));
        assert!(!MediaType::Tv.contains(2040));
        assert!(MediaType::Movie.contains(2045));
    }

    #[test]
    fn test_transient_errors() {
        assert!(IndexerError::Timeout.is_transient());
        assert!(IndexerError::ConnectionFailed("refused".into()).is_transient());
        assert!(!IndexerError::AuthFailed("bad key".into()).is_transient());
        assert!(!IndexerError::InvalidResponse("garbage".into()).is_transient());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            IndexerError::RateLimited {
                indexer: "a".into(),
                retry_after_ms: None
            }
            .code(),
            "rate_limited"
        );
        assert_eq!(IndexerError::NotFound("x".into()).code(), "not_found");
    }
}
