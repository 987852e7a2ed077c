use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Vertical resolution tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    R480p,
    R576p,
    R720p,
    R1080p,
    R2160p,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::R480p => "480p",
            Resolution::R576p => "576p",
            Resolution::R720p => "720p",
            Resolution::R1080p => "1080p",
            Resolution::R2160p => "2160p",
        }
    }

    /// Classify probed frame dimensions.
    ///
    /// Width is checked as well as height so letterboxed encodes
    /// (1920x800) still land in the right tier.
    pub fn from_dimensions(width: u32, height: u32) -> Option<Self> {
        if width == 0 && height == 0 {
            return None;
        }
        let tier = if width >= 3200 || height >= 2000 {
            Resolution::R2160p
        } else if width >= 1700 || height >= 1000 {
            Resolution::R1080p
        } else if width >= 1200 || height >= 700 {
            Resolution::R720p
        } else if height >= 540 {
            Resolution::R576p
        } else {
            Resolution::R480p
        };
        Some(tier)
    }

    pub(crate) fn rank(&self) -> u8 {
        match self {
            Resolution::R480p => 1,
            Resolution::R576p => 2,
            Resolution::R720p => 3,
            Resolution::R1080p => 4,
            Resolution::R2160p => 5,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the release was ripped from, lowest tier first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Cam,
    Telesync,
    Dvd,
    Hdtv,
    WebRip,
    WebDl,
    BluRay,
    Remux,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cam => "CAM",
            Source::Telesync => "TS",
            Source::Dvd => "DVD",
            Source::Hdtv => "HDTV",
            Source::WebRip => "WEBRip",
            Source::WebDl => "WEB-DL",
            Source::BluRay => "BluRay",
            Source::Remux => "Remux",
        }
    }

    pub(crate) fn rank(&self) -> u8 {
        *self as u8 + 1
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    Xvid,
    Mpeg2,
    X264,
    Vc1,
    X265,
    Av1,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::Xvid => "XviD",
            VideoCodec::Mpeg2 => "MPEG2",
            VideoCodec::X264 => "x264",
            VideoCodec::Vc1 => "VC-1",
            VideoCodec::X265 => "x265",
            VideoCodec::Av1 => "AV1",
        }
    }

    /// Map an ffprobe `codec_name`.
    pub fn from_probe_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "h264" | "avc" | "avc1" => Some(VideoCodec::X264),
            "hevc" | "h265" => Some(VideoCodec::X265),
            "av1" => Some(VideoCodec::Av1),
            "vc1" => Some(VideoCodec::Vc1),
            "mpeg2video" => Some(VideoCodec::Mpeg2),
            "mpeg4" | "msmpeg4v3" => Some(VideoCodec::Xvid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    Mp3,
    Aac,
    Opus,
    Ac3,
    Eac3,
    Dts,
    Flac,
    DtsHd,
    TrueHd,
}

impl AudioCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "MP3",
            AudioCodec::Aac => "AAC",
            AudioCodec::Opus => "Opus",
            AudioCodec::Ac3 => "AC3",
            AudioCodec::Eac3 => "EAC3",
            AudioCodec::Dts => "DTS",
            AudioCodec::Flac => "FLAC",
            AudioCodec::DtsHd => "DTS-HD",
            AudioCodec::TrueHd => "TrueHD",
        }
    }

    /// Map an ffprobe `codec_name` (and `profile` for DTS variants).
    pub fn from_probe_name(name: &str, profile: Option<&str>) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mp3" => Some(AudioCodec::Mp3),
            "aac" => Some(AudioCodec::Aac),
            "opus" => Some(AudioCodec::Opus),
            "ac3" => Some(AudioCodec::Ac3),
            "eac3" => Some(AudioCodec::Eac3),
            "flac" => Some(AudioCodec::Flac),
            "truehd" => Some(AudioCodec::TrueHd),
            "dts" => match profile {
                Some(p) if p.to_ascii_lowercase().contains("hd") => Some(AudioCodec::DtsHd),
                _ => Some(AudioCodec::Dts),
            },
            _ => None,
        }
    }
}

/// High dynamic range format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Hdr {
    Hlg,
    Hdr10,
    Hdr10Plus,
    DolbyVision,
}

impl Hdr {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hdr::Hlg => "HLG",
            Hdr::Hdr10 => "HDR10",
            Hdr::Hdr10Plus => "HDR10+",
            Hdr::DolbyVision => "DV",
        }
    }
}

/// Technical quality of a release or a placed file.
///
/// The same shape comes out of name parsing and out of probing, so a search
/// result can be compared against a file already in the library.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Quality {
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub video_codec: Option<VideoCodec>,
    #[serde(default)]
    pub audio_codec: Option<AudioCodec>,
    #[serde(default)]
    pub hdr: Option<Hdr>,
    #[serde(default)]
    pub proper: bool,
    #[serde(default)]
    pub repack: bool,
}

impl Quality {
    /// Revision bumps: a PROPER or REPACK supersedes the original release.
    pub fn revision(&self) -> u8 {
        self.proper as u8 + self.repack as u8
    }

    /// Ordering used for collision resolution.
    ///
    /// Resolution first, then source, then revision, then HDR presence.
    /// Codecs do not count: a re-encode of equal quality is not an upgrade.
    /// Unknown attributes sort below any known one.
    pub fn compare(&self, other: &Quality) -> Ordering {
        let res = |q: &Quality| q.resolution.map(|r| r.rank()).unwrap_or(0);
        let src = |q: &Quality| q.source.map(|s| s.rank()).unwrap_or(0);

        res(self)
            .cmp(&res(other))
            .then_with(|| src(self).cmp(&src(other)))
            .then_with(|| self.revision().cmp(&other.revision()))
            .then_with(|| self.hdr.is_some().cmp(&other.hdr.is_some()))
    }

    pub fn is_better_than(&self, other: &Quality) -> bool {
        self.compare(other) == Ordering::Greater
    }

    /// Short label used in library file names. Empty when nothing is known.
    pub fn label(&self) -> String {
        match (self.resolution, self.source) {
            (Some(r), _) => r.as_str().to_string(),
            (None, Some(s)) => s.as_str().to_string(),
            (None, None) => String::new(),
        }
    }

    /// Fill attributes missing from `self` with those in `fallback`.
    pub fn or(self, fallback: Quality) -> Quality {
        Quality {
            resolution: self.resolution.or(fallback.resolution),
            source: self.source.or(fallback.source),
            video_codec: self.video_codec.or(fallback.video_codec),
            audio_codec: self.audio_codec.or(fallback.audio_codec),
            hdr: self.hdr.or(fallback.hdr),
            proper: self.proper || fallback.proper,
            repack: self.repack || fallback.repack,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(r) = self.resolution {
            parts.push(r.as_str());
        }
        if let Some(s) = self.source {
            parts.push(s.as_str());
        }
        if let Some(c) = self.video_codec {
            parts.push(c.as_str());
        }
        if let Some(a) = self.audio_codec {
            parts.push(a.as_str());
        }
        if let Some(h) = self.hdr {
            parts.push(h.as_str());
        }
        if self.proper {
            parts.push("PROPER");
        }
        if self.repack {
            parts.push("REPACK");
        }
        if parts.is_empty() {
            f.write_str("unknown")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(res: Option<Resolution>, source: Option<Source>) -> Quality {
        Quality {
            resolution: res,
            source,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolution_dominates_source() {
        let a = q(Some(Resolution::R1080p), Some(Source::Hdtv));
        let b = q(Some(Resolution::R720p), Some(Source::Remux));
        assert!(a.is_better_than(&b));
        assert!(!b.is_better_than(&a));
    }

    #[test]
    fn test_source_breaks_resolution_tie() {
        let a = q(Some(Resolution::R1080p), Some(Source::BluRay));
        let b = q(Some(Resolution::R1080p), Some(Source::WebDl));
        assert_eq!(a.compare(&b), Ordering::Greater);
    }

    #[test]
    fn test_proper_beats_original() {
        let original = q(Some(Resolution::R1080p), Some(Source::WebDl));
        let proper = Quality {
            proper: true,
            ..original
        };
        assert!(proper.is_better_than(&original));
    }

    #[test]
    fn test_equal_quality_is_not_better() {
        let a = q(Some(Resolution::R1080p), None);
        assert!(!a.is_better_than(&a));
    }

    #[test]
    fn test_codec_alone_is_not_better() {
        let x264 = Quality {
            video_codec: Some(VideoCodec::X264),
            ..q(Some(Resolution::R1080p), Some(Source::WebDl))
        };
        let x265 = Quality {
            video_codec: Some(VideoCodec::X265),
            ..x264
        };
        assert_eq!(x265.compare(&x264), Ordering::Equal);
        assert!(!x265.is_better_than(&x264));
        assert!(!x264.is_better_than(&x265));
    }

    #[test]
    fn test_unknown_sorts_below_known() {
        let unknown = Quality::default();
        let known = q(Some(Resolution::R480p), None);
        assert!(known.is_better_than(&unknown));
    }

    #[test]
    fn test_from_dimensions() {
        assert_eq!(
            Resolution::from_dimensions(1920, 800),
            Some(Resolution::R1080p)
        );
        assert_eq!(
            Resolution::from_dimensions(3840, 2160),
            Some(Resolution::R2160p)
        );
        assert_eq!(
            Resolution::from_dimensions(1280, 720),
            Some(Resolution::R720p)
        );
        assert_eq!(Resolution::from_dimensions(720, 576), Some(Resolution::R576p));
        assert_eq!(Resolution::from_dimensions(640, 360), Some(Resolution::R480p));
        assert_eq!(Resolution::from_dimensions(0, 0), None);
    }

    #[test]
    fn test_label() {
        assert_eq!(q(Some(Resolution::R1080p), None).label(), "1080p");
        assert_eq!(q(None, Some(Source::Dvd)).label(), "DVD");
        assert_eq!(Quality::default().label(), "");
    }

    #[test]
    fn test_or_fills_missing() {
        let probed = Quality {
            resolution: Some(Resolution::R2160p),
            video_codec: Some(VideoCodec::X265),
            ..Default::default()
        };
        let named = Quality {
            resolution: Some(Resolution::R1080p),
            source: Some(Source::BluRay),
            repack: true,
            ..Default::default()
        };
        let merged = probed.or(named);
        assert_eq!(merged.resolution, Some(Resolution::R2160p));
        assert_eq!(merged.source, Some(Source::BluRay));
        assert!(merged.repack);
    }

    #[test]
    fn test_dts_profile_mapping() {
        assert_eq!(
            AudioCodec::from_probe_name("dts", Some("DTS-HD MA")),
            Some(AudioCodec::DtsHd)
        );
        assert_eq!(AudioCodec::from_probe_name("dts", None), Some(AudioCodec::Dts));
    }
}
