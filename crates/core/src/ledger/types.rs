use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an acquisition is for: a library item or one of its sub-items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcquisitionTarget {
    Item { item_id: String },
    SubItem { sub_item_id: String },
}

impl AcquisitionTarget {
    pub fn item(id: impl Into<String>) -> Self {
        Self::Item { item_id: id.into() }
    }

    pub fn sub_item(id: impl Into<String>) -> Self {
        Self::SubItem {
            sub_item_id: id.into(),
        }
    }
}

/// Whether one transfer covers one target or a bundle of sub-items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchTarget {
    #[default]
    Single,
    Batch { sub_item_ids: Vec<String> },
}

impl BatchTarget {
    pub fn is_batch(&self) -> bool {
        matches!(self, BatchTarget::Batch { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionStatus {
    /// Handed to the client, not yet seen in a status poll.
    Pending,
    Active,
    Completed,
    /// Claimed by an import job.
    Importing,
    Failed,
    /// Vanished from the client.
    Missing,
    Cancelled,
}

impl AcquisitionStatus {
    pub const ALL: [AcquisitionStatus; 7] = [
        AcquisitionStatus::Pending,
        AcquisitionStatus::Active,
        AcquisitionStatus::Completed,
        AcquisitionStatus::Importing,
        AcquisitionStatus::Failed,
        AcquisitionStatus::Missing,
        AcquisitionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionStatus::Pending => "pending",
            AcquisitionStatus::Active => "active",
            AcquisitionStatus::Completed => "completed",
            AcquisitionStatus::Importing => "importing",
            AcquisitionStatus::Failed => "failed",
            AcquisitionStatus::Missing => "missing",
            AcquisitionStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses the monitor still polls the client for.
    pub fn is_tracked(&self) -> bool {
        matches!(self, AcquisitionStatus::Pending | AcquisitionStatus::Active)
    }

    pub fn can_cancel(&self) -> bool {
        self.is_tracked()
    }

    /// Still expected to deliver files.
    pub fn is_in_flight(&self) -> bool {
        !self.is_retryable()
    }

    /// Terminal failures a user may retry or purge.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AcquisitionStatus::Failed | AcquisitionStatus::Missing | AcquisitionStatus::Cancelled
        )
    }
}

impl fmt::Display for AcquisitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcquisitionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown acquisition status '{}'", s))
    }
}

/// Everything needed to start tracking a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAcquisition {
    pub target: AcquisitionTarget,
    /// Indexer the result came from.
    pub provider: String,
    pub title: String,
    /// Magnet URI or download URL.
    pub reference: String,
    pub info_hash: Option<String>,
    pub client_name: String,
    pub client_id: String,
    #[serde(default)]
    pub batch: BatchTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionRecord {
    pub id: String,
    pub target: AcquisitionTarget,
    pub provider: String,
    pub title: String,
    pub reference: String,
    pub info_hash: Option<String>,
    pub client_name: String,
    pub client_id: String,
    pub batch: BatchTarget,
    pub status: AcquisitionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// First poll at which the client had no matching transfer.
    pub unseen_since: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl AcquisitionRecord {
    /// The fields a retry re-initiates from.
    pub fn to_new(&self) -> NewAcquisition {
        NewAcquisition {
            target: self.target.clone(),
            provider: self.provider.clone(),
            title: self.title.clone(),
            reference: self.reference.clone(),
            info_hash: self.info_hash.clone(),
            client_name: self.client_name.clone(),
            client_id: self.client_id.clone(),
            batch: self.batch.clone(),
        }
    }

    /// Sub-items this record will deliver: its own target plus any batch
    /// members.
    pub fn sub_item_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        if let AcquisitionTarget::SubItem { sub_item_id } = &self.target {
            ids.push(sub_item_id.as_str());
        }
        if let BatchTarget::Batch { sub_item_ids } = &self.batch {
            ids.extend(sub_item_ids.iter().map(String::as_str));
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_and_flags() {
        for status in AcquisitionStatus::ALL {
            assert_eq!(status.as_str().parse::<AcquisitionStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<AcquisitionStatus>().is_err());
        assert!(AcquisitionStatus::Pending.can_cancel());
        assert!(!AcquisitionStatus::Importing.can_cancel());
        assert!(AcquisitionStatus::Missing.is_retryable());
        assert!(!AcquisitionStatus::Completed.is_retryable());
        assert!(AcquisitionStatus::Importing.is_in_flight());
        assert!(!AcquisitionStatus::Cancelled.is_in_flight());
    }

    #[test]
    fn test_target_serialization() {
        let json = serde_json::to_string(&AcquisitionTarget::sub_item("ep-2")).unwrap();
        assert_eq!(json, r#"{"type":"sub_item","sub_item_id":"ep-2"}"#);

        let batch: BatchTarget =
            serde_json::from_str(r#"{"type":"batch","sub_item_ids":["a","b"]}"#).unwrap();
        assert!(batch.is_batch());
        assert_eq!(BatchTarget::default(), BatchTarget::Single);
    }
}
