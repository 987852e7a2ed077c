//! Mock media probe for testing.

use std::path::Path;

use async_trait::async_trait;

use crate::import::{ImportError, MediaProbe, ProbeInfo};

/// Returns the same [`ProbeInfo`] for every file, or fails every call.
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    info: ProbeInfo,
    fail: bool,
    remove_probed: bool,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.info.width = Some(width);
        self.info.height = Some(height);
        self
    }

    pub fn with_info(mut self, info: ProbeInfo) -> Self {
        self.info = info;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Delete each file after probing it, as if the transfer vanished
    /// before placement.
    pub fn removing_probed(mut self) -> Self {
        self.remove_probed = true;
        self
    }
}

#[async_trait]
impl MediaProbe for MockProbe {
    async fn probe(&self, path: &Path) -> Result<ProbeInfo, ImportError> {
        if self.fail {
            return Err(ImportError::ProbeFailed {
                path: path.to_path_buf(),
                reason: "mock probe failure".to_string(),
            });
        }
        if self.remove_probed {
            let _ = tokio::fs::remove_file(path).await;
        }
        Ok(self.info.clone())
    }
}
