use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{AcquisitionRecord, AcquisitionStatus, NewAcquisition};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Acquisition not found: {0}")]
    NotFound(String),

    #[error("Cannot {operation} acquisition {id}: current status is {status}")]
    InvalidState {
        id: String,
        status: AcquisitionStatus,
        operation: String,
    },

    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Database(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct LedgerFilter {
    /// Only these statuses (all when `None`).
    pub statuses: Option<Vec<AcquisitionStatus>>,
    pub client_name: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for LedgerFilter {
    fn default() -> Self {
        Self {
            statuses: None,
            client_name: None,
            limit: 500,
            offset: 0,
        }
    }
}

impl LedgerFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(mut self, statuses: &[AcquisitionStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client_name = Some(client.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Durable store for acquisition records.
pub trait LedgerStore: Send + Sync {
    fn insert(&self, new: NewAcquisition) -> Result<AcquisitionRecord, LedgerError>;

    fn get(&self, id: &str) -> Result<Option<AcquisitionRecord>, LedgerError>;

    /// Oldest first.
    fn list(&self, filter: &LedgerFilter) -> Result<Vec<AcquisitionRecord>, LedgerError>;

    /// Move a record to `to` only if its current status is one of `from`.
    ///
    /// Returns false when the record is gone or in another status.
    /// `last_error` replaces the stored error when given. Entering
    /// `completed` stamps `completed_at`; any transition clears
    /// `unseen_since`.
    fn transition(
        &self,
        id: &str,
        from: &[AcquisitionStatus],
        to: AcquisitionStatus,
        last_error: Option<&str>,
    ) -> Result<bool, LedgerError>;

    fn set_unseen_since(&self, id: &str, at: Option<DateTime<Utc>>) -> Result<(), LedgerError>;

    /// Every `importing` record back to `completed`; returns their ids.
    fn reset_interrupted_imports(&self) -> Result<Vec<String>, LedgerError>;

    /// Returns whether a record was deleted.
    fn delete(&self, id: &str) -> Result<bool, LedgerError>;

    /// Atomically take the import claim on a completed record.
    fn claim_for_import(&self, id: &str) -> Result<bool, LedgerError> {
        self.transition(
            id,
            &[AcquisitionStatus::Completed],
            AcquisitionStatus::Importing,
            None,
        )
    }

    /// Cancel a pending or active record.
    fn cancel(&self, id: &str) -> Result<AcquisitionRecord, LedgerError> {
        let record = self
            .get(id)?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        let cancelled = self.transition(
            id,
            &[AcquisitionStatus::Pending, AcquisitionStatus::Active],
            AcquisitionStatus::Cancelled,
            Some("cancelled by user"),
        )?;
        if !cancelled {
            let status = self.get(id)?.map(|r| r.status).unwrap_or(record.status);
            return Err(LedgerError::InvalidState {
                id: id.to_string(),
                status,
                operation: "cancel".to_string(),
            });
        }
        self.get(id)?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }
}
