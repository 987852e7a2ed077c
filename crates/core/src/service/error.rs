use thiserror::Error;

use crate::batch::BatchError;
use crate::client::ClientError;
use crate::ledger::LedgerError;
use crate::metadata::MetadataError;
use crate::search::SearchError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Download client error: {0}")]
    Client(#[from] ClientError),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    #[error("Metadata error: {0}")]
    Metadata(MetadataError),

    #[error("Library error: {0}")]
    Library(String),
}

impl From<LedgerError> for ServiceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(id) => ServiceError::NotFound(format!("acquisition {}", id)),
            e @ LedgerError::InvalidState { .. } => ServiceError::InvalidState(e.to_string()),
            e => ServiceError::Ledger(e),
        }
    }
}

impl From<MetadataError> for ServiceError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::NotFound(what) => ServiceError::NotFound(what),
            e => ServiceError::Metadata(e),
        }
    }
}

impl From<crate::library::LibraryError> for ServiceError {
    fn from(e: crate::library::LibraryError) -> Self {
        ServiceError::Library(e.to_string())
    }
}

impl From<BatchError> for ServiceError {
    fn from(e: BatchError) -> Self {
        match e {
            BatchError::Metadata(e) => e.into(),
            BatchError::Library(e) => e.into(),
        }
    }
}
