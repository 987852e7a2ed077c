//! Types for the acquisition monitor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The client could not be listed this poll. Its records are untouched.
    #[error("client '{client}' unreachable: {reason}")]
    ClientUnreachable { client: String, reason: String },

    /// The record points at a client that is no longer configured.
    #[error("record {id} references unknown client '{client}'")]
    RecordOrphaned { id: String, client: String },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// What one poll changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    /// Tracked records looked at.
    pub polled: usize,
    pub activated: usize,
    pub completed: usize,
    pub failed: usize,
    pub missing: usize,
    /// Records whose client was unreachable, left as they were.
    pub skipped: usize,
    pub unreachable_clients: Vec<String>,
    pub imports_dispatched: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub importing: usize,
    /// Import tasks spawned and not yet finished.
    pub imports_in_flight: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MonitorError::ClientUnreachable {
            client: "qb".into(),
            reason: "timed out".into(),
        };
        assert_eq!(err.to_string(), "client 'qb' unreachable: timed out");

        let err = MonitorError::RecordOrphaned {
            id: "r1".into(),
            client: "old".into(),
        };
        assert_eq!(err.to_string(), "record r1 references unknown client 'old'");
    }
}
