//! Library file records: which file on disk belongs to which item or
//! sub-item, and at what quality.

mod sqlite;
mod types;

pub use sqlite::SqliteLibrary;
pub use types::{FileOwner, LibraryError, LibraryFile, LibraryFilter, LibraryStore, NewLibraryFile};
