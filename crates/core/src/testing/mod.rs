//! Testing utilities and mock implementations.
//!
//! Mocks for every external seam of the pipeline, so the aggregator,
//! monitor, import job and service can be exercised without real indexers,
//! clients or ffprobe.
//!
//! # Example
//!
//! ```rust,ignore
//! use grabarr_core::testing::{fixtures, MockClient, MockIndexer};
//!
//! let indexer = MockIndexer::new("a").with_results(vec![fixtures::result("Show.S01E01.1080p", 10)]);
//! let client = MockClient::new("qb");
//! client.insert_transfer("abc", "Show.S01E01", ClientState::Transferring, 0.5);
//! ```

mod mock_client;
mod mock_indexer;
mod mock_probe;

pub use mock_client::{MockClient, RecordedAdd};
pub use mock_indexer::{ConcurrencyProbe, MockIndexer};
pub use mock_probe::MockProbe;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::indexer::SearchResult;
    use crate::metadata::{InMemoryCatalog, MediaItem, MediaKind, SubItem};
    use crate::release::parse_release;

    /// A search result with its quality parsed from `title`.
    pub fn result(title: &str, seeders: u32) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            size_bytes: 1024 * 1024 * 700, // 700 MB
            seeders,
            leechers: 0,
            reference: format!("magnet:?xt=urn:btih:{}", fake_hash(title)),
            info_hash: None,
            indexer: "mock-indexer".to_string(),
            category: Some(5000),
            publish_date: None,
            details_url: None,
            quality: parse_release(title).quality,
        }
    }

    /// Same as [`result`], with the info hash exposed.
    pub fn hashed_result(title: &str, seeders: u32) -> SearchResult {
        let mut r = result(title, seeders);
        r.info_hash = Some(fake_hash(title));
        r
    }

    /// Stable 40-character hex string derived from `seed`.
    pub fn fake_hash(seed: &str) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(seed.as_bytes());
        digest
            .iter()
            .take(20)
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub fn series(id: &str, title: &str) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            kind: MediaKind::Series,
            title: title.to_string(),
            year: None,
            provider_ids: Default::default(),
        }
    }

    pub fn movie(id: &str, title: &str, year: u16) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            kind: MediaKind::Movie,
            title: title.to_string(),
            year: Some(year),
            provider_ids: Default::default(),
        }
    }

    /// `{item_id}-s{NN}e{MM}`
    pub fn episode(item_id: &str, season: u32, episode: u32, title: Option<&str>) -> SubItem {
        SubItem {
            id: format!("{}-s{:02}e{:02}", item_id, season, episode),
            item_id: item_id.to_string(),
            season,
            episode,
            title: title.map(str::to_string),
        }
    }

    /// "Show" with ten episodes in season 1; episode 2 is titled
    /// "Episode Title".
    pub fn show_catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.insert_item(series("show", "Show"));
        for e in 1..=10 {
            let title = (e == 2).then_some("Episode Title");
            catalog.insert_sub_item(episode("show", 1, e, title));
        }
        catalog
    }
}
