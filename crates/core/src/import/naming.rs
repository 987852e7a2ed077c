//! Library destination paths.

use std::path::{Path, PathBuf};

use crate::metadata::{MediaItem, SubItem};
use crate::release::Quality;

/// Strip characters that are invalid in file names on common filesystems.
pub fn sanitize_component(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', ' '])
        .to_string()
}

fn with_label(base: String, quality: &Quality) -> String {
    let label = quality.label();
    if label.is_empty() {
        base
    } else {
        format!("{} - {}", base, label)
    }
}

/// `{root}/{Title} ({Year})/{Title} ({Year}) - {res}.{ext}`
///
/// `part` numbers multi-file items.
pub fn item_destination(
    root: &Path,
    item: &MediaItem,
    quality: &Quality,
    ext: &str,
    part: Option<usize>,
) -> PathBuf {
    let title = sanitize_component(&item.title);
    let folder = match item.year {
        Some(year) => format!("{} ({})", title, year),
        None => title,
    };
    let mut name = with_label(folder.clone(), quality);
    if let Some(n) = part {
        name = format!("{} - Part {}", name, n);
    }
    root.join(&folder).join(format!("{}.{}", name, ext))
}

/// `{root}/{Parent}/Season {NN}/{Parent} - S{NN}E{MM} - {Episode Title} - {res}.{ext}`
pub fn sub_item_destination(
    root: &Path,
    parent: &MediaItem,
    sub_item: &SubItem,
    quality: &Quality,
    ext: &str,
) -> PathBuf {
    let show = sanitize_component(&parent.title);
    let mut name = format!(
        "{} - S{:02}E{:02}",
        show, sub_item.season, sub_item.episode
    );
    if let Some(title) = sub_item.title.as_deref().map(sanitize_component) {
        if !title.is_empty() {
            name = format!("{} - {}", name, title);
        }
    }
    let name = with_label(name, quality);
    root.join(&show)
        .join(format!("Season {:02}", sub_item.season))
        .join(format!("{}.{}", name, ext))
}

/// `path` below `root` with `/` separators.
pub fn relative_to(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MediaKind;
    use crate::release::Resolution;

    fn show() -> MediaItem {
        MediaItem {
            id: "show".into(),
            kind: MediaKind::Series,
            title: "Show".into(),
            year: Some(2019),
            provider_ids: Default::default(),
        }
    }

    fn hd() -> Quality {
        Quality {
            resolution: Some(Resolution::R1080p),
            ..Default::default()
        }
    }

    #[test]
    fn test_sub_item_destination() {
        let sub = SubItem {
            id: "e2".into(),
            item_id: "show".into(),
            season: 1,
            episode: 2,
            title: Some("Episode Title".into()),
        };
        let path = sub_item_destination(Path::new("/lib"), &show(), &sub, &hd(), "mkv");
        assert_eq!(
            path,
            PathBuf::from("/lib/Show/Season 01/Show - S01E02 - Episode Title - 1080p.mkv")
        );

        let untitled = SubItem { title: None, ..sub };
        let path =
            sub_item_destination(Path::new("/lib"), &show(), &untitled, &Quality::default(), "mp4");
        assert_eq!(path, PathBuf::from("/lib/Show/Season 01/Show - S01E02.mp4"));
    }

    #[test]
    fn test_item_destination() {
        let movie = MediaItem {
            id: "m".into(),
            kind: MediaKind::Movie,
            title: "Alien: Covenant".into(),
            year: Some(2017),
            provider_ids: Default::default(),
        };
        let path = item_destination(Path::new("/lib"), &movie, &hd(), "mkv", None);
        assert_eq!(
            path,
            PathBuf::from("/lib/Alien Covenant (2017)/Alien Covenant (2017) - 1080p.mkv")
        );

        let path = item_destination(Path::new("/lib"), &movie, &hd(), "mkv", Some(2));
        assert!(path.ends_with("Alien Covenant (2017) - 1080p - Part 2.mkv"));
    }

    #[test]
    fn test_sanitize_and_relative() {
        assert_eq!(sanitize_component("What?  If..."), "What If");
        assert_eq!(
            relative_to(Path::new("/lib"), Path::new("/lib/Show/Season 01/a.mkv")),
            "Show/Season 01/a.mkv"
        );
    }
}
