//! SQLite-backed library file store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};

use super::{FileOwner, LibraryError, LibraryFile, LibraryFilter, LibraryStore, NewLibraryFile};
use crate::release::Quality;

const COLUMNS: &str = "id, root, relative_path, size_bytes, quality, item_id, sub_item_id, \
    release_group, source_name, created_at, updated_at";

pub struct SqliteLibrary {
    conn: Mutex<Connection>,
}

impl SqliteLibrary {
    pub fn new(path: &Path) -> Result<Self, LibraryError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, LibraryError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LibraryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS library_files (
                id TEXT PRIMARY KEY,
                root TEXT NOT NULL,
                relative_path TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                quality TEXT NOT NULL,
                item_id TEXT,
                sub_item_id TEXT,
                release_group TEXT,
                source_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(root, relative_path),
                CHECK ((item_id IS NULL) <> (sub_item_id IS NULL))
            );

            CREATE INDEX IF NOT EXISTS idx_library_files_item ON library_files(item_id);
            CREATE INDEX IF NOT EXISTS idx_library_files_sub_item ON library_files(sub_item_id);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LibraryError> {
        self.conn
            .lock()
            .map_err(|_| LibraryError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<LibraryFile> {
        let quality_json: String = row.get(4)?;
        let item_id: Option<String> = row.get(5)?;
        let sub_item_id: Option<String> = row.get(6)?;

        let owner = match (item_id, sub_item_id) {
            (Some(item_id), None) => FileOwner::Item { item_id },
            (None, Some(sub_item_id)) => FileOwner::SubItem { sub_item_id },
            _ => {
                return Err(rusqlite::Error::InvalidColumnType(
                    5,
                    "item_id".to_string(),
                    rusqlite::types::Type::Null,
                ))
            }
        };

        Ok(LibraryFile {
            id: row.get(0)?,
            root: row.get(1)?,
            relative_path: row.get(2)?,
            size_bytes: row.get::<_, i64>(3)?.max(0) as u64,
            quality: serde_json::from_str::<Quality>(&quality_json).unwrap_or_default(),
            owner,
            release_group: row.get(7)?,
            source_name: row.get(8)?,
            created_at: parse_timestamp(row.get(9)?),
            updated_at: parse_timestamp(row.get(10)?),
        })
    }

    fn query(
        conn: &Connection,
        sql: &str,
        values: &[&dyn ToSql],
    ) -> Result<Vec<LibraryFile>, LibraryError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(values, Self::row_to_file)?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }
}

fn parse_timestamp(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn owner_clause(owner: &FileOwner) -> (&'static str, String) {
    match owner {
        FileOwner::Item { item_id } => ("item_id = ?", item_id.clone()),
        FileOwner::SubItem { sub_item_id } => ("sub_item_id = ?", sub_item_id.clone()),
    }
}

impl LibraryStore for SqliteLibrary {
    fn upsert(&self, file: NewLibraryFile) -> Result<LibraryFile, LibraryError> {
        let now = Utc::now().to_rfc3339();
        let quality_json = serde_json::to_string(&file.quality)
            .map_err(|e| LibraryError::Database(e.to_string()))?;
        let (item_id, sub_item_id) = file.owner.columns();

        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO library_files ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(root, relative_path) DO UPDATE SET
                    size_bytes = excluded.size_bytes,
                    quality = excluded.quality,
                    item_id = excluded.item_id,
                    sub_item_id = excluded.sub_item_id,
                    release_group = excluded.release_group,
                    source_name = excluded.source_name,
                    updated_at = excluded.updated_at",
                COLUMNS
            ),
            params![
                uuid::Uuid::new_v4().to_string(),
                file.root,
                file.relative_path,
                file.size_bytes as i64,
                quality_json,
                item_id,
                sub_item_id,
                file.release_group,
                file.source_name,
                now,
                now,
            ],
        )?;

        conn.query_row(
            &format!(
                "SELECT {} FROM library_files WHERE root = ? AND relative_path = ?",
                COLUMNS
            ),
            params![file.root, file.relative_path],
            Self::row_to_file,
        )
        .map_err(LibraryError::from)
    }

    fn get(&self, id: &str) -> Result<Option<LibraryFile>, LibraryError> {
        let conn = self.lock()?;
        let file = conn
            .query_row(
                &format!("SELECT {} FROM library_files WHERE id = ?", COLUMNS),
                params![id],
                Self::row_to_file,
            )
            .optional()?;
        Ok(file)
    }

    fn get_by_path(
        &self,
        root: &str,
        relative_path: &str,
    ) -> Result<Option<LibraryFile>, LibraryError> {
        let conn = self.lock()?;
        let file = conn
            .query_row(
                &format!(
                    "SELECT {} FROM library_files WHERE root = ? AND relative_path = ?",
                    COLUMNS
                ),
                params![root, relative_path],
                Self::row_to_file,
            )
            .optional()?;
        Ok(file)
    }

    fn find_by_owner(&self, owner: &FileOwner) -> Result<Vec<LibraryFile>, LibraryError> {
        let (clause, value) = owner_clause(owner);
        let values: [&dyn ToSql; 1] = [&value];
        let conn = self.lock()?;
        Self::query(
            &conn,
            &format!(
                "SELECT {} FROM library_files WHERE {} ORDER BY relative_path",
                COLUMNS, clause
            ),
            &values,
        )
    }

    fn list(&self, filter: &LibraryFilter) -> Result<Vec<LibraryFile>, LibraryError> {
        let conn = self.lock()?;
        match &filter.owner {
            Some(owner) => {
                let (clause, value) = owner_clause(owner);
                let values: [&dyn ToSql; 3] = [&value, &filter.limit, &filter.offset];
                Self::query(
                    &conn,
                    &format!(
                        "SELECT {} FROM library_files WHERE {} ORDER BY root, relative_path LIMIT ? OFFSET ?",
                        COLUMNS, clause
                    ),
                    &values,
                )
            }
            None => {
                let values: [&dyn ToSql; 2] = [&filter.limit, &filter.offset];
                Self::query(
                    &conn,
                    &format!(
                        "SELECT {} FROM library_files ORDER BY root, relative_path LIMIT ? OFFSET ?",
                        COLUMNS
                    ),
                    &values,
                )
            }
        }
    }

    fn delete(&self, id: &str) -> Result<bool, LibraryError> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM library_files WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::{Quality, Resolution};

    fn new_file(path: &str, owner: FileOwner) -> NewLibraryFile {
        NewLibraryFile {
            root: "/library".to_string(),
            relative_path: path.to_string(),
            size_bytes: 1_000,
            quality: Quality {
                resolution: Some(Resolution::R1080p),
                ..Default::default()
            },
            owner,
            release_group: Some("GRP".to_string()),
            source_name: Some("Show.S01E02.1080p-GRP.mkv".to_string()),
        }
    }

    fn episode(id: &str) -> FileOwner {
        FileOwner::SubItem {
            sub_item_id: id.to_string(),
        }
    }

    #[test]
    fn test_upsert_is_idempotent_on_path() {
        let store = SqliteLibrary::in_memory().unwrap();
        let first = store.upsert(new_file("Show/Season 01/a.mkv", episode("e2"))).unwrap();

        let mut again = new_file("Show/Season 01/a.mkv", episode("e2"));
        again.size_bytes = 2_000;
        let second = store.upsert(again).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.size_bytes, 2_000);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(store.list(&LibraryFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_find_by_owner() {
        let store = SqliteLibrary::in_memory().unwrap();
        store.upsert(new_file("a.mkv", episode("e1"))).unwrap();
        store.upsert(new_file("b.mkv", episode("e2"))).unwrap();
        store
            .upsert(new_file(
                "Movie (2020)/Movie (2020) - 1080p.mkv",
                FileOwner::Item {
                    item_id: "m1".to_string(),
                },
            ))
            .unwrap();

        let files = store.find_by_owner(&episode("e2")).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "b.mkv");
        assert_eq!(files[0].quality.resolution, Some(Resolution::R1080p));

        let movie = store
            .list(&LibraryFilter {
                owner: Some(FileOwner::Item {
                    item_id: "m1".to_string(),
                }),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(movie.len(), 1);
        assert!(store.find_by_owner(&episode("e9")).unwrap().is_empty());
    }

    #[test]
    fn test_check_constraint_rejects_two_owners() {
        let store = SqliteLibrary::in_memory().unwrap();
        let conn = store.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO library_files (id, root, relative_path, size_bytes, quality, item_id, sub_item_id, created_at, updated_at)
             VALUES ('x', '/r', 'p', 1, '{}', 'i', 's', '', '')",
            [],
        );
        assert!(result.is_err());
        let result = conn.execute(
            "INSERT INTO library_files (id, root, relative_path, size_bytes, quality, created_at, updated_at)
             VALUES ('y', '/r', 'q', 1, '{}', '', '')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_get_by_path_and_delete() {
        let store = SqliteLibrary::in_memory().unwrap();
        let file = store.upsert(new_file("a.mkv", episode("e1"))).unwrap();
        assert_eq!(
            store.get_by_path("/library", "a.mkv").unwrap().unwrap().id,
            file.id
        );
        assert!(store.get(&file.id).unwrap().is_some());
        assert!(store.delete(&file.id).unwrap());
        assert!(!store.delete(&file.id).unwrap());
        assert!(store.get_by_path("/library", "a.mkv").unwrap().is_none());
    }
}
