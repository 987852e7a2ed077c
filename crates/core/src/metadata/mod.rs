//! Metadata enrichment contract.
//!
//! Resolves titles to canonical items and lists their sub-items (episodes).
//! [`InMemoryCatalog`] is the bundled provider, loaded from a JSON file.

mod memory;
mod types;

pub use memory::{normalize_title, InMemoryCatalog};
pub use types::{MediaItem, MediaKind, MetadataError, MetadataProvider, SubItem};
