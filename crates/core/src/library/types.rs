use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::AcquisitionTarget;
use crate::release::Quality;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Library file not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for LibraryError {
    fn from(e: rusqlite::Error) -> Self {
        LibraryError::Database(e.to_string())
    }
}

/// Exactly one of item or sub-item owns a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileOwner {
    Item { item_id: String },
    SubItem { sub_item_id: String },
}

impl FileOwner {
    pub(crate) fn columns(&self) -> (Option<&str>, Option<&str>) {
        match self {
            FileOwner::Item { item_id } => (Some(item_id.as_str()), None),
            FileOwner::SubItem { sub_item_id } => (None, Some(sub_item_id.as_str())),
        }
    }
}

impl From<&AcquisitionTarget> for FileOwner {
    fn from(target: &AcquisitionTarget) -> Self {
        match target {
            AcquisitionTarget::Item { item_id } => FileOwner::Item {
                item_id: item_id.clone(),
            },
            AcquisitionTarget::SubItem { sub_item_id } => FileOwner::SubItem {
                sub_item_id: sub_item_id.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryFile {
    pub id: String,
    pub root: String,
    /// Path below `root`, `/`-separated.
    pub relative_path: String,
    pub size_bytes: u64,
    pub quality: Quality,
    pub owner: FileOwner,
    pub release_group: Option<String>,
    /// Name of the file as it was acquired.
    pub source_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLibraryFile {
    pub root: String,
    pub relative_path: String,
    pub size_bytes: u64,
    pub quality: Quality,
    pub owner: FileOwner,
    pub release_group: Option<String>,
    pub source_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LibraryFilter {
    pub owner: Option<FileOwner>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for LibraryFilter {
    fn default() -> Self {
        Self {
            owner: None,
            limit: 500,
            offset: 0,
        }
    }
}

pub trait LibraryStore: Send + Sync {
    /// Insert, or update the row already at (root, relative_path).
    fn upsert(&self, file: NewLibraryFile) -> Result<LibraryFile, LibraryError>;

    fn get(&self, id: &str) -> Result<Option<LibraryFile>, LibraryError>;

    fn get_by_path(
        &self,
        root: &str,
        relative_path: &str,
    ) -> Result<Option<LibraryFile>, LibraryError>;

    fn find_by_owner(&self, owner: &FileOwner) -> Result<Vec<LibraryFile>, LibraryError>;

    fn list(&self, filter: &LibraryFilter) -> Result<Vec<LibraryFile>, LibraryError>;

    fn delete(&self, id: &str) -> Result<bool, LibraryError>;
}
