//! Domain events published by the acquisition pipeline.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::ledger::AcquisitionTarget;
use crate::library::FileOwner;
use crate::release::Quality;

/// Free-form context attached to every event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventMetadata {
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// A file an import could not place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    AcquisitionInitiated {
        acquisition_id: String,
        target: AcquisitionTarget,
        title: String,
        metadata: EventMetadata,
    },
    AcquisitionCompleted {
        acquisition_id: String,
        metadata: EventMetadata,
    },
    AcquisitionFailed {
        acquisition_id: String,
        metadata: EventMetadata,
    },
    AcquisitionCancelled {
        acquisition_id: String,
        metadata: EventMetadata,
    },
    FileImported {
        acquisition_id: String,
        library_file_id: String,
        owner: FileOwner,
        path: String,
        metadata: EventMetadata,
    },
    /// Some files were imported and the record retired, the rest were not.
    ImportIncomplete {
        acquisition_id: String,
        placed: usize,
        failures: Vec<FileFailure>,
        metadata: EventMetadata,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::AcquisitionInitiated { .. } => "acquisition_initiated",
            DomainEvent::AcquisitionCompleted { .. } => "acquisition_completed",
            DomainEvent::AcquisitionFailed { .. } => "acquisition_failed",
            DomainEvent::AcquisitionCancelled { .. } => "acquisition_cancelled",
            DomainEvent::FileImported { .. } => "file_imported",
            DomainEvent::ImportIncomplete { .. } => "import_incomplete",
        }
    }

    pub fn acquisition_id(&self) -> &str {
        match self {
            DomainEvent::AcquisitionInitiated { acquisition_id, .. }
            | DomainEvent::AcquisitionCompleted { acquisition_id, .. }
            | DomainEvent::AcquisitionFailed { acquisition_id, .. }
            | DomainEvent::AcquisitionCancelled { acquisition_id, .. }
            | DomainEvent::FileImported { acquisition_id, .. }
            | DomainEvent::ImportIncomplete { acquisition_id, .. } => acquisition_id,
        }
    }
}

/// Fan-out of domain events over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        trace!(kind = event.kind(), acquisition_id = %event.acquisition_id(), "Publishing event");
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(DomainEvent::AcquisitionFailed {
            acquisition_id: "a1".into(),
            metadata: EventMetadata::default().with_error("disk full"),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), "acquisition_failed");
        assert_eq!(event.acquisition_id(), "a1");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(DomainEvent::AcquisitionCompleted {
            acquisition_id: "a1".into(),
            metadata: EventMetadata::default(),
        });
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(DomainEvent::AcquisitionCancelled {
            acquisition_id: "a1".into(),
            metadata: EventMetadata::default().with_client("qb"),
        })
        .unwrap();
        assert_eq!(json["type"], "acquisition_cancelled");
        assert_eq!(json["metadata"]["client"], "qb");
        assert!(json["metadata"].get("error").is_none());
    }
}
