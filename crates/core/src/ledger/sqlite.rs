//! SQLite-backed acquisition ledger.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};

use super::{
    AcquisitionRecord, AcquisitionStatus, AcquisitionTarget, BatchTarget, LedgerError,
    LedgerFilter, LedgerStore, NewAcquisition,
};

const COLUMNS: &str = "id, target, provider, title, reference, info_hash, client_name, \
    client_id, batch, status, created_at, updated_at, completed_at, unseen_since, last_error";

pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (or create) the ledger in the database file at `path`.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS acquisitions (
                id TEXT PRIMARY KEY,
                target TEXT NOT NULL,
                provider TEXT NOT NULL,
                title TEXT NOT NULL,
                reference TEXT NOT NULL,
                info_hash TEXT,
                client_name TEXT NOT NULL,
                client_id TEXT NOT NULL,
                batch TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT,
                unseen_since TEXT,
                last_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_acquisitions_status ON acquisitions(status);
            CREATE INDEX IF NOT EXISTS idx_acquisitions_client ON acquisitions(client_name, client_id);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<AcquisitionRecord> {
        let target_json: String = row.get(1)?;
        let batch_json: String = row.get(8)?;
        let status_str: String = row.get(9)?;

        let target: AcquisitionTarget = serde_json::from_str(&target_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let batch: BatchTarget = serde_json::from_str(&batch_json).unwrap_or_default();
        let status: AcquisitionStatus = status_str.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, e.into())
        })?;

        Ok(AcquisitionRecord {
            id: row.get(0)?,
            target,
            provider: row.get(2)?,
            title: row.get(3)?,
            reference: row.get(4)?,
            info_hash: row.get(5)?,
            client_name: row.get(6)?,
            client_id: row.get(7)?,
            batch,
            status,
            created_at: parse_timestamp(row.get(10)?),
            updated_at: parse_timestamp(row.get(11)?),
            completed_at: row.get::<_, Option<String>>(12)?.map(parse_timestamp),
            unseen_since: row.get::<_, Option<String>>(13)?.map(parse_timestamp),
            last_error: row.get(14)?,
        })
    }
}

fn parse_timestamp(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, LedgerError> {
    serde_json::to_string(value).map_err(|e| LedgerError::Database(e.to_string()))
}

impl LedgerStore for SqliteLedger {
    fn insert(&self, new: NewAcquisition) -> Result<AcquisitionRecord, LedgerError> {
        let now = Utc::now();
        let record = AcquisitionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            target: new.target,
            provider: new.provider,
            title: new.title,
            reference: new.reference,
            info_hash: new.info_hash.map(|h| h.to_lowercase()),
            client_name: new.client_name,
            client_id: new.client_id.to_lowercase(),
            batch: new.batch,
            status: AcquisitionStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            unseen_since: None,
            last_error: None,
        };

        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO acquisitions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL)",
                COLUMNS
            ),
            params![
                record.id,
                to_json(&record.target)?,
                record.provider,
                record.title,
                record.reference,
                record.info_hash,
                record.client_name,
                record.client_id,
                to_json(&record.batch)?,
                record.status.as_str(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(record)
    }

    fn get(&self, id: &str) -> Result<Option<AcquisitionRecord>, LedgerError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM acquisitions WHERE id = ?", COLUMNS),
                params![id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn list(&self, filter: &LedgerFilter) -> Result<Vec<AcquisitionRecord>, LedgerError> {
        let mut conditions = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(statuses) = &filter.statuses {
            if statuses.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; statuses.len()].join(", ");
            conditions.push(format!("status IN ({})", placeholders));
            for status in statuses {
                values.push(Box::new(status.as_str()));
            }
        }
        if let Some(client) = &filter.client_name {
            conditions.push("client_name = ?".to_string());
            values.push(Box::new(client.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        values.push(Box::new(filter.limit));
        values.push(Box::new(filter.offset));

        let sql = format!(
            "SELECT {} FROM acquisitions {} ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
            COLUMNS, where_clause
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn transition(
        &self,
        id: &str,
        from: &[AcquisitionStatus],
        to: AcquisitionStatus,
        last_error: Option<&str>,
    ) -> Result<bool, LedgerError> {
        if from.is_empty() {
            return Ok(false);
        }
        let now = Utc::now().to_rfc3339();
        let completed_at = (to == AcquisitionStatus::Completed).then(|| now.clone());
        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE acquisitions SET status = ?, updated_at = ?, unseen_since = NULL, \
             completed_at = COALESCE(?, completed_at), last_error = COALESCE(?, last_error) \
             WHERE id = ? AND status IN ({})",
            placeholders
        );

        let mut values: Vec<Box<dyn ToSql>> = vec![
            Box::new(to.as_str()),
            Box::new(now),
            Box::new(completed_at),
            Box::new(last_error.map(str::to_string)),
            Box::new(id.to_string()),
        ];
        for status in from {
            values.push(Box::new(status.as_str()));
        }
        let param_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let conn = self.lock()?;
        let changed = conn.execute(&sql, param_refs.as_slice())?;
        Ok(changed > 0)
    }

    fn set_unseen_since(&self, id: &str, at: Option<DateTime<Utc>>) -> Result<(), LedgerError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE acquisitions SET unseen_since = ? WHERE id = ?",
            params![at.map(|t| t.to_rfc3339()), id],
        )?;
        Ok(())
    }

    fn reset_interrupted_imports(&self) -> Result<Vec<String>, LedgerError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let ids = {
            let mut stmt = tx.prepare(
                "SELECT id FROM acquisitions WHERE status = 'importing' ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        tx.execute(
            "UPDATE acquisitions SET status = 'completed', updated_at = ? WHERE status = 'importing'",
            params![Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(ids)
    }

    fn delete(&self, id: &str) -> Result<bool, LedgerError> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM acquisitions WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }
}
