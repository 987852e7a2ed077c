pub mod batch;
pub mod client;
pub mod config;
pub mod events;
pub mod import;
pub mod indexer;
pub mod ledger;
pub mod library;
pub mod metadata;
pub mod metrics;
pub mod monitor;
pub mod release;
pub mod search;
pub mod service;
pub mod testing;
pub mod torrent;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use events::{DomainEvent, EventBus, EventMetadata, FileFailure};
pub use ledger::{AcquisitionRecord, AcquisitionStatus, AcquisitionTarget, BatchTarget};
pub use release::{parse_release, Quality, ReleaseInfo};
pub use service::{AcquisitionService, ServiceError};
