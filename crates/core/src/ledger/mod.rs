//! Acquisition ledger: the short-lived record of each in-flight acquisition.
//!
//! A record is inserted when a transfer is handed to a client, driven
//! through its [`AcquisitionStatus`] by the monitor, and deleted once the
//! import has placed its files. Status changes go through
//! [`LedgerStore::transition`], a compare-and-set on the current status, so
//! the monitor, the import job and user cancels never race each other into
//! an invalid state.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteLedger;
pub use store::{LedgerError, LedgerFilter, LedgerStore};
pub use types::{
    AcquisitionRecord, AcquisitionStatus, AcquisitionTarget, BatchTarget, NewAcquisition,
};
