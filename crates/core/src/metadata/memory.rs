use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Deserialize;

use super::{MediaItem, MetadataError, MetadataProvider, SubItem};

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    items: Vec<MediaItem>,
    #[serde(default)]
    sub_items: Vec<SubItem>,
}

/// Metadata held in memory.
///
/// The JSON form is `{ "items": [...], "sub_items": [...] }`.
#[derive(Default)]
pub struct InMemoryCatalog {
    data: RwLock<CatalogFile>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        let data: CatalogFile =
            serde_json::from_str(json).map_err(|e| MetadataError::Parse(e.to_string()))?;
        Ok(Self {
            data: RwLock::new(data),
        })
    }

    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| MetadataError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn insert_item(&self, item: MediaItem) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.items.retain(|i| i.id != item.id);
        data.items.push(item);
    }

    pub fn insert_sub_item(&self, sub_item: SubItem) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.sub_items.retain(|s| s.id != sub_item.id);
        data.sub_items.push(sub_item);
    }

    fn read<T>(&self, f: impl FnOnce(&CatalogFile) -> T) -> T {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        f(&data)
    }
}

/// Lowercase words with punctuation dropped, for title comparison.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl MetadataProvider for InMemoryCatalog {
    async fn resolve(
        &self,
        title: &str,
        year: Option<u16>,
        provider_id: Option<&str>,
    ) -> Result<Option<MediaItem>, MetadataError> {
        let wanted = normalize_title(title);
        Ok(self.read(|data| {
            if let Some(pid) = provider_id {
                if let Some(item) = data
                    .items
                    .iter()
                    .find(|i| i.provider_ids.values().any(|v| v == pid))
                {
                    return Some(item.clone());
                }
            }
            data.items
                .iter()
                .filter(|i| normalize_title(&i.title) == wanted)
                .find(|i| match (year, i.year) {
                    (Some(want), Some(have)) => want == have,
                    _ => true,
                })
                .cloned()
        }))
    }

    async fn item(&self, id: &str) -> Result<MediaItem, MetadataError> {
        self.read(|data| data.items.iter().find(|i| i.id == id).cloned())
            .ok_or_else(|| MetadataError::NotFound(format!("item {}", id)))
    }

    async fn sub_items(&self, item_id: &str) -> Result<Vec<SubItem>, MetadataError> {
        let mut subs: Vec<SubItem> = self.read(|data| {
            data.sub_items
                .iter()
                .filter(|s| s.item_id == item_id)
                .cloned()
                .collect()
        });
        subs.sort_by_key(|s| (s.season, s.episode));
        Ok(subs)
    }

    async fn sub_item(&self, id: &str) -> Result<SubItem, MetadataError> {
        self.read(|data| data.sub_items.iter().find(|s| s.id == id).cloned())
            .ok_or_else(|| MetadataError::NotFound(format!("sub-item {}", id)))
    }
}
