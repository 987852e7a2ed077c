use std::sync::Arc;

use grabarr_core::monitor::AcquisitionMonitor;
use grabarr_core::{AcquisitionService, Config, EventBus, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    service: Arc<AcquisitionService>,
    monitor: Option<Arc<AcquisitionMonitor>>,
}

impl AppState {
    pub fn new(
        config: Config,
        service: Arc<AcquisitionService>,
        monitor: Option<Arc<AcquisitionMonitor>>,
    ) -> Self {
        Self {
            config,
            service,
            monitor,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn service(&self) -> &AcquisitionService {
        &self.service
    }

    /// The background monitor, when enabled in config.
    pub fn monitor(&self) -> Option<&Arc<AcquisitionMonitor>> {
        self.monitor.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        self.service.events()
    }
}
