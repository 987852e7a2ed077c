//! Import configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Root of the managed library.
    pub library_root: PathBuf,

    /// Try a hardlink before anything else. The transfer keeps seeding from
    /// the original path.
    #[serde(default = "default_true")]
    pub prefer_hardlink: bool,

    /// Allow renaming the source into the library (copy + delete across
    /// devices).
    #[serde(default)]
    pub allow_move: bool,

    /// Delete a lower-quality file at the destination instead of moving it
    /// aside.
    #[serde(default)]
    pub replace_existing: bool,

    /// Where superseded files go. Next to the new file when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    /// Compare SHA-256 of source and destination after a copy.
    #[serde(default)]
    pub verify_copies: bool,

    /// Lowercase extensions treated as media.
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,

    /// Remove the transfer from the client (data kept) after import.
    #[serde(default)]
    pub remove_completed: bool,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Buffer size for file copies in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    #[serde(default)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_probe_timeout(),
        }
    }
}

/// Placement settings, snapshotted once per job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementPolicy {
    pub prefer_hardlink: bool,
    pub allow_move: bool,
    pub replace_existing: bool,
    pub backup_dir: Option<PathBuf>,
    pub verify_copies: bool,
    pub buffer_size: usize,
}

impl ImportConfig {
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
            prefer_hardlink: true,
            allow_move: false,
            replace_existing: false,
            backup_dir: None,
            verify_copies: false,
            media_extensions: default_media_extensions(),
            remove_completed: false,
            max_concurrent: default_max_concurrent(),
            buffer_size: default_buffer_size(),
            probe: ProbeConfig::default(),
        }
    }

    pub fn placement_policy(&self) -> PlacementPolicy {
        PlacementPolicy {
            prefer_hardlink: self.prefer_hardlink,
            allow_move: self.allow_move,
            replace_existing: self.replace_existing,
            backup_dir: self.backup_dir.clone(),
            verify_copies: self.verify_copies,
            buffer_size: self.buffer_size,
        }
    }

    pub fn is_media_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.media_extensions.iter().any(|e| *e == ext)
    }
}

fn default_true() -> bool {
    true
}

fn default_media_extensions() -> Vec<String> {
    ["mkv", "mp4", "m4v", "avi", "mov", "ts", "m2ts", "wmv", "webm", "mpg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_concurrent() -> usize {
    2
}

fn default_buffer_size() -> usize {
    1024 * 1024 // 1 MB
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_probe_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let config: ImportConfig = toml::from_str(r#"library_root = "/library""#).unwrap();
        assert!(config.prefer_hardlink);
        assert!(!config.allow_move);
        assert!(!config.probe.enabled);
        assert!(config.is_media_extension("MKV"));
        assert!(!config.is_media_extension("nfo"));
        assert_eq!(config.placement_policy().buffer_size, 1024 * 1024);
    }

    #[test]
    fn test_deserialize_full() {
        let config: ImportConfig = toml::from_str(
            r#"
            library_root = "/library"
            prefer_hardlink = false
            allow_move = true
            replace_existing = true
            backup_dir = "/library/.superseded"
            verify_copies = true
            media_extensions = ["mkv"]

            [probe]
            enabled = true
            ffprobe_path = "/usr/local/bin/ffprobe"
            "#,
        )
        .unwrap();
        let policy = config.placement_policy();
        assert!(!policy.prefer_hardlink);
        assert!(policy.allow_move);
        assert_eq!(policy.backup_dir, Some(PathBuf::from("/library/.superseded")));
        assert!(config.probe.enabled);
        assert_eq!(config.probe.timeout_secs, 30);
        assert!(!config.is_media_extension("mp4"));
    }
}
