use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::quality::{AudioCodec, Hdr, Quality, Resolution, Source, VideoCodec};

/// Extensions stripped before parsing so they do not leak into tags.
const STRIPPED_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "ts", "m2ts", "webm", "mov", "wmv", "mpg", "mpeg", "torrent",
    "nzb",
];

/// Tokens that look like a `-GROUP` suffix but are part of a tag.
const NOT_A_GROUP: &[&str] = &["dl", "rip", "hd", "ts", "ray", "x264", "x265", "ma", "x"];

static LEADING_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[([^\]]+)\]\s*").unwrap());
static TRAILING_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"-([A-Za-z0-9]+)$").unwrap());
static TRAILING_BRACKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s*\[[^\]]*\])+\s*$").unwrap());

static SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bs(\d{1,2})((?:[ .\-]?e\d{1,3})+)\b").unwrap());
static EPISODE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)e(\d{1,3})").unwrap());
static CROSS_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{2,3})\b").unwrap());
static SEASON_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:s(\d{1,2})|season[ .]?(\d{1,2}))\b").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());

static EDITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(extended(?:[ .](?:cut|edition))?|director'?s[ .]cut|unrated|remastered|theatrical(?:[ .]cut)?|imax|criterion|uncut)\b",
    )
    .unwrap()
});
static PROPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bproper\b").unwrap());
static REPACK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:repack|rerip)\b").unwrap());

static RESOLUTION_TAGS: Lazy<Vec<(Regex, Resolution)>> = Lazy::new(|| {
    vec![
        (re(r"(?i)\b(?:2160p|4k|uhd)\b"), Resolution::R2160p),
        (re(r"(?i)\b1080[pi]\b"), Resolution::R1080p),
        (re(r"(?i)\b720p\b"), Resolution::R720p),
        (re(r"(?i)\b576[pi]\b"), Resolution::R576p),
        (re(r"(?i)\b480[pi]\b"), Resolution::R480p),
    ]
});
static DIMENSIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{3,4})x(\d{3,4})\b").unwrap());

static SOURCE_TAGS: Lazy<Vec<(Regex, Source)>> = Lazy::new(|| {
    vec![
        (re(r"(?i)remux\b"), Source::Remux),
        (
            re(r"(?i)\b(?:blu-?ray|bdrip|brrip|bd25|bd50)\b"),
            Source::BluRay,
        ),
        (re(r"(?i)\bweb-?rip\b"), Source::WebRip),
        (re(r"(?i)\b(?:web-?dl|web)\b"), Source::WebDl),
        (re(r"(?i)\b(?:hdtv|pdtv|dsr)\b"), Source::Hdtv),
        (re(r"(?i)\b(?:dvd-?rip|dvdr|dvd[59]?)\b"), Source::Dvd),
        (re(r"(?i)\b(?:telesync|telecine|hd-?ts)\b"), Source::Telesync),
        (re(r"\b(?:TS|TC)\b"), Source::Telesync),
        (re(r"(?i)\b(?:cam|camrip|hdcam)\b"), Source::Cam),
    ]
});

static VIDEO_CODEC_TAGS: Lazy<Vec<(Regex, VideoCodec)>> = Lazy::new(|| {
    vec![
        (re(r"(?i)\b(?:x265|h\.?265|hevc)\b"), VideoCodec::X265),
        (re(r"(?i)\b(?:x264|h\.?264|avc)\b"), VideoCodec::X264),
        (re(r"(?i)\bav1\b"), VideoCodec::Av1),
        (re(r"(?i)\bvc-?1\b"), VideoCodec::Vc1),
        (re(r"(?i)\bmpeg-?2\b"), VideoCodec::Mpeg2),
        (re(r"(?i)\b(?:xvid|divx)\b"), VideoCodec::Xvid),
    ]
});

static AUDIO_CODEC_TAGS: Lazy<Vec<(Regex, AudioCodec)>> = Lazy::new(|| {
    vec![
        (re(r"(?i)\btrue-?hd\b"), AudioCodec::TrueHd),
        (re(r"(?i)\bdts-?(?:hd|x|ma)\b"), AudioCodec::DtsHd),
        (re(r"(?i)\b(?:e-?ac-?3|ddp|dd\+)"), AudioCodec::Eac3),
        (re(r"(?i)\bdts\b"), AudioCodec::Dts),
        (
            re(r"(?i)\b(?:ac-?3|dd(?:[257]\.?[01])?)\b"),
            AudioCodec::Ac3,
        ),
        (re(r"(?i)\bflac\b"), AudioCodec::Flac),
        (re(r"(?i)\bopus\b"), AudioCodec::Opus),
        (re(r"(?i)\baac(?:[257]\.?[01])?\b"), AudioCodec::Aac),
        (re(r"(?i)\bmp3\b"), AudioCodec::Mp3),
    ]
});

static HDR_TAGS: Lazy<Vec<(Regex, Hdr)>> = Lazy::new(|| {
    vec![
        (re(r"(?i)\b(?:dv|dovi|dolby[ .]?vision)\b"), Hdr::DolbyVision),
        (re(r"(?i)\bhdr10(?:\+|plus)"), Hdr::Hdr10Plus),
        (re(r"(?i)\bhdr(?:10)?\b"), Hdr::Hdr10),
        (re(r"(?i)\bhlg\b"), Hdr::Hlg),
    ]
});

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

/// Structured view of a release name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Human title with separators normalized to spaces.
    pub title: String,
    pub year: Option<u16>,
    pub season: Option<u32>,
    /// Episode numbers, ascending. Empty for movies and season packs.
    pub episodes: Vec<u32>,
    pub edition: Option<String>,
    pub release_group: Option<String>,
    pub quality: Quality,
}

impl ReleaseInfo {
    pub fn episode(&self) -> Option<u32> {
        self.episodes.first().copied()
    }

    /// A release covering a whole season rather than specific episodes.
    pub fn is_season_pack(&self) -> bool {
        self.season.is_some() && self.episodes.is_empty()
    }

    pub fn covers_episode(&self, season: u32, episode: u32) -> bool {
        self.season == Some(season) && self.episodes.contains(&episode)
    }
}

/// Parse a release or file name.
///
/// Accepts bare names as well as paths; only the last path component is
/// looked at. Never fails: unrecognized input yields a title and an empty
/// quality.
pub fn parse_release(name: &str) -> ReleaseInfo {
    let file_name = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();
    let stem = strip_extension(file_name);

    let (leading_group, body) = match LEADING_GROUP.captures(stem) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str().trim().to_string()),
            &stem[caps.get(0).map(|m| m.end()).unwrap_or(0)..],
        ),
        None => (None, stem),
    };
    let text = body.replace('_', " ");

    let mut info = ReleaseInfo {
        quality: parse_quality(&text),
        ..Default::default()
    };

    let mut markers: Vec<usize> = Vec::new();

    if let Some(caps) = SEASON_EPISODE.captures(&text) {
        markers.push(start_of(&caps));
        info.season = number(&caps, 1);
        info.episodes = episode_list(caps.get(2).map(|m| m.as_str()).unwrap_or_default());
    } else if let Some(caps) = CROSS_EPISODE.captures(&text) {
        markers.push(start_of(&caps));
        info.season = number(&caps, 1);
        info.episodes = number(&caps, 2).into_iter().collect();
    } else if let Some(caps) = SEASON_ONLY.captures(&text) {
        markers.push(start_of(&caps));
        info.season = number(&caps, 1).or_else(|| number(&caps, 2));
    }

    if let Some(m) = EDITION.find(&text) {
        markers.push(m.start());
        info.edition = Some(m.as_str().replace('.', " "));
    }

    markers.extend(tag_positions(&text));

    let first_marker = markers.iter().copied().min().unwrap_or(text.len());

    // Last year before the first tag, skipping a year that opens the name
    // so titles like "2012" or "1917" survive.
    let year = YEAR
        .find_iter(&text)
        .filter(|m| m.start() > 0 && m.start() < first_marker)
        .last();
    let cut = match year {
        Some(m) => {
            info.year = m.as_str().parse().ok();
            m.start().min(first_marker)
        }
        None => first_marker,
    };

    info.title = clean_title(&text[..cut]);
    info.release_group = leading_group.or_else(|| trailing_group(body));
    info
}

/// Extract only the quality attributes of a name.
pub(crate) fn parse_quality(text: &str) -> Quality {
    let resolution = first_tag(&RESOLUTION_TAGS, text).or_else(|| {
        DIMENSIONS.captures(text).and_then(|caps| {
            let w = number(&caps, 1)?;
            let h = number(&caps, 2)?;
            Resolution::from_dimensions(w, h)
        })
    });

    Quality {
        resolution,
        source: first_tag(&SOURCE_TAGS, text),
        video_codec: first_tag(&VIDEO_CODEC_TAGS, text),
        audio_codec: first_tag(&AUDIO_CODEC_TAGS, text),
        hdr: first_tag(&HDR_TAGS, text),
        proper: PROPER.is_match(text),
        repack: REPACK.is_match(text),
    }
}

fn first_tag<T: Copy>(table: &[(Regex, T)], text: &str) -> Option<T> {
    table
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, value)| *value)
}

fn tag_positions(text: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    for (pattern, _) in RESOLUTION_TAGS.iter() {
        positions.extend(pattern.find(text).map(|m| m.start()));
    }
    for (pattern, _) in SOURCE_TAGS.iter() {
        positions.extend(pattern.find(text).map(|m| m.start()));
    }
    for (pattern, _) in VIDEO_CODEC_TAGS.iter() {
        positions.extend(pattern.find(text).map(|m| m.start()));
    }
    for (pattern, _) in HDR_TAGS.iter() {
        positions.extend(pattern.find(text).map(|m| m.start()));
    }
    positions.extend(PROPER.find(text).map(|m| m.start()));
    positions.extend(REPACK.find(text).map(|m| m.start()));
    positions.extend(DIMENSIONS.find(text).map(|m| m.start()));
    positions
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if STRIPPED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            stem
        }
        _ => name,
    }
}

fn start_of(caps: &Captures<'_>) -> usize {
    caps.get(0).map(|m| m.start()).unwrap_or(0)
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, group: usize) -> Option<T> {
    caps.get(group).and_then(|m| m.as_str().parse().ok())
}

/// `E01E02` lists episodes; `E01-E03` is an inclusive range.
fn episode_list(raw: &str) -> Vec<u32> {
    let mut episodes: Vec<u32> = EPISODE_NUMBER
        .captures_iter(raw)
        .filter_map(|caps| number(&caps, 1))
        .collect();

    if episodes.len() == 2 && raw.contains('-') && episodes[1] > episodes[0] {
        episodes = (episodes[0]..=episodes[1]).collect();
    }
    episodes.sort_unstable();
    episodes.dedup();
    episodes
}

fn clean_title(raw: &str) -> String {
    let spaced = raw.replace('.', " ");
    let trimmed = spaced.trim_end_matches(|c: char| c.is_whitespace() || "-([".contains(c));
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn trailing_group(body: &str) -> Option<String> {
    let without_tags = TRAILING_BRACKETS.replace(body, "");
    let caps = TRAILING_GROUP.captures(without_tags.trim())?;
    let group = caps.get(1)?.as_str();
    let lower = group.to_ascii_lowercase();
    if NOT_A_GROUP.contains(&lower.as_str()) || RESOLUTION_TAGS.iter().any(|(p, _)| p.is_match(group))
    {
        return None;
    }
    Some(group.to_string())
}
