use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Metadata source unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid catalog data: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series,
}

/// A canonical library item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub kind: MediaKind,
    pub title: String,
    #[serde(default)]
    pub year: Option<u16>,
    /// External ids keyed by source, e.g. `"tmdb" => "603"`.
    #[serde(default)]
    pub provider_ids: BTreeMap<String, String>,
}

/// One episode of a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubItem {
    pub id: String,
    pub item_id: String,
    pub season: u32,
    pub episode: u32,
    #[serde(default)]
    pub title: Option<String>,
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Find the canonical item for a title, optionally narrowed by year or an
    /// external id.
    async fn resolve(
        &self,
        title: &str,
        year: Option<u16>,
        provider_id: Option<&str>,
    ) -> Result<Option<MediaItem>, MetadataError>;

    async fn item(&self, id: &str) -> Result<MediaItem, MetadataError>;

    /// Ordered by season, then episode.
    async fn sub_items(&self, item_id: &str) -> Result<Vec<SubItem>, MetadataError>;

    async fn sub_item(&self, id: &str) -> Result<SubItem, MetadataError>;
}
