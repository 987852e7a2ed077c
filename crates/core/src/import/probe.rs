//! Technical media probing via ffprobe.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::ImportError;
use crate::release::{AudioCodec, Hdr, Quality, Resolution, VideoCodec};

/// Attributes read from the media streams themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub video_codec: Option<VideoCodec>,
    pub audio_codec: Option<AudioCodec>,
    pub hdr: Option<Hdr>,
}

impl ProbeInfo {
    /// Merge over a name-derived quality: the probe decides resolution,
    /// codecs and HDR, the name keeps source and revision flags.
    pub fn reconcile(&self, from_name: Quality) -> Quality {
        let resolution = match (self.width, self.height) {
            (Some(w), Some(h)) => Resolution::from_dimensions(w, h),
            _ => None,
        };
        Quality {
            resolution: resolution.or(from_name.resolution),
            video_codec: self.video_codec.or(from_name.video_codec),
            audio_codec: self.audio_codec.or(from_name.audio_codec),
            hdr: self.hdr.or(from_name.hdr),
            ..from_name
        }
    }
}

#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeInfo, ImportError>;
}

pub struct FfprobeProbe {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    fn parse_output(path: &Path, output: &str) -> Result<ProbeInfo, ImportError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            profile: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            color_transfer: Option<String>,
            #[serde(default)]
            side_data_list: Vec<SideData>,
        }

        #[derive(Deserialize)]
        struct SideData {
            #[serde(default)]
            side_data_type: String,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| ImportError::ProbeFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        // Cover art shows up as an mjpeg/png video stream.
        let video = probe.streams.iter().find(|s| {
            s.codec_type == "video"
                && !matches!(s.codec_name.as_deref(), Some("mjpeg") | Some("png"))
        });
        let audio = probe.streams.iter().find(|s| s.codec_type == "audio");

        let hdr = video.and_then(|v| {
            let side = |needle: &str| {
                v.side_data_list
                    .iter()
                    .any(|d| d.side_data_type.contains(needle))
            };
            if side("DOVI") {
                Some(Hdr::DolbyVision)
            } else if side("SMPTE2094-40") {
                Some(Hdr::Hdr10Plus)
            } else {
                match v.color_transfer.as_deref() {
                    Some("smpte2084") => Some(Hdr::Hdr10),
                    Some("arib-std-b67") => Some(Hdr::Hlg),
                    _ => None,
                }
            }
        });

        Ok(ProbeInfo {
            width: video.and_then(|v| v.width),
            height: video.and_then(|v| v.height),
            video_codec: video
                .and_then(|v| v.codec_name.as_deref())
                .and_then(VideoCodec::from_probe_name),
            audio_codec: audio.and_then(|a| {
                a.codec_name
                    .as_deref()
                    .and_then(|name| AudioCodec::from_probe_name(name, a.profile.as_deref()))
            }),
            hdr,
        })
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<ProbeInfo, ImportError> {
        let run = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| ImportError::ProbeFailed {
                path: path.to_path_buf(),
                reason: format!("timed out after {:?}", self.timeout),
            })?
            .map_err(|e| ImportError::ProbeFailed {
                path: path.to_path_buf(),
                reason: format!("cannot run {}: {}", self.ffprobe_path.display(), e),
            })?;

        if !output.status.success() {
            return Err(ImportError::ProbeFailed {
                path: path.to_path_buf(),
                reason: format!(
                    "ffprobe failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Self::parse_output(path, &String::from_utf8_lossy(&output.stdout))
    }
}
