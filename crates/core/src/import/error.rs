use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::client::ClientError;
use crate::ledger::LedgerError;
use crate::library::LibraryError;
use crate::release::Quality;

/// ENOSPC on Linux and macOS.
const ENOSPC: i32 = 28;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No space left on device at {path}")]
    NoDestinationSpace { path: PathBuf },

    #[error("Permission denied at {path}")]
    FilesystemPermission { path: PathBuf },

    #[error("{path} already holds {existing}, not replacing it with {incoming}")]
    NameCollision {
        path: PathBuf,
        existing: Quality,
        incoming: Quality,
    },

    #[error("Probe failed for {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No media files found under {path}")]
    NoMediaFiles { path: PathBuf },

    #[error("Checksum mismatch copying to {path}")]
    ChecksumMismatch { path: PathBuf },

    #[error("Cannot import: {0}")]
    Unresolvable(String),

    #[error("Download client error: {0}")]
    Client(#[from] ClientError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl ImportError {
    /// Classify an I/O failure at `path`.
    pub fn io(path: &Path, e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::PermissionDenied {
            ImportError::FilesystemPermission {
                path: path.to_path_buf(),
            }
        } else if e.kind() == io::ErrorKind::StorageFull || e.raw_os_error() == Some(ENOSPC) {
            ImportError::NoDestinationSpace {
                path: path.to_path_buf(),
            }
        } else {
            ImportError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::NoDestinationSpace { .. } => "no_destination_space",
            ImportError::FilesystemPermission { .. } => "filesystem_permission",
            ImportError::NameCollision { .. } => "name_collision",
            ImportError::ProbeFailed { .. } => "probe_failed",
            ImportError::Io { .. } => "io",
            ImportError::NoMediaFiles { .. } => "no_media_files",
            ImportError::ChecksumMismatch { .. } => "checksum_mismatch",
            ImportError::Unresolvable(_) => "unresolvable",
            ImportError::Client(_) => "client",
            ImportError::Library(_) => "library",
            ImportError::Ledger(_) => "ledger",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let p = Path::new("/x");
        assert_eq!(
            ImportError::io(p, io::Error::from(io::ErrorKind::PermissionDenied)).kind(),
            "filesystem_permission"
        );
        assert_eq!(
            ImportError::io(p, io::Error::from_raw_os_error(ENOSPC)).kind(),
            "no_destination_space"
        );
        assert_eq!(
            ImportError::io(p, io::Error::from(io::ErrorKind::NotFound)).kind(),
            "io"
        );
    }
}
