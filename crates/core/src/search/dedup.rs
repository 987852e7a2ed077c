//! Deduplication of search results across providers.

use std::collections::{HashMap, HashSet};

use crate::indexer::SearchResult;

/// Stable identity of a release.
///
/// The info hash when the provider exposes one, else the normalized title
/// together with the byte size.
pub fn dedupe_key(result: &SearchResult) -> String {
    match hash_key(result) {
        Some(key) => key,
        None => title_key(result),
    }
}

fn hash_key(result: &SearchResult) -> Option<String> {
    match result.info_hash.as_deref() {
        Some(hash) if !hash.is_empty() => Some(format!("hash:{}", hash.to_lowercase())),
        _ => None,
    }
}

fn title_key(result: &SearchResult) -> String {
    format!("title:{}:{}", normalize_title(&result.title), result.size_bytes)
}

fn normalize_title(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse results sharing a key into one.
///
/// The copy with the most seeders wins; ties go to the provider whose name
/// sorts first, so the outcome does not depend on response order. Missing
/// hash and publish date are filled from the other copies, keeping the
/// earliest date. A copy without a hash joins the hashed copy with the same
/// title and size, unless several distinct hashes share that title and size.
pub fn deduplicate(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut hashes_by_title: HashMap<String, HashSet<String>> = HashMap::new();
    for result in &results {
        if let Some(key) = hash_key(result) {
            hashes_by_title
                .entry(title_key(result))
                .or_default()
                .insert(key);
        }
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<SearchResult> = Vec::with_capacity(results.len());

    for result in results {
        let key = match hash_key(&result) {
            Some(key) => key,
            None => {
                let title = title_key(&result);
                match hashes_by_title.get(&title) {
                    Some(hashes) if hashes.len() == 1 => {
                        hashes.iter().next().cloned().unwrap_or(title)
                    }
                    _ => title,
                }
            }
        };
        match index.get(&key) {
            Some(&i) => {
                let existing = &unique[i];
                let replaces = result.seeders > existing.seeders
                    || (result.seeders == existing.seeders && result.indexer < existing.indexer);
                let merged = if replaces {
                    merge(result, existing)
                } else {
                    merge(existing.clone(), &result)
                };
                unique[i] = merged;
            }
            None => {
                index.insert(key, unique.len());
                unique.push(result);
            }
        }
    }

    unique
}

fn merge(mut winner: SearchResult, other: &SearchResult) -> SearchResult {
    if winner.info_hash.is_none() {
        winner.info_hash = other.info_hash.clone();
    }
    winner.publish_date = match (winner.publish_date, other.publish_date) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::result;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_key_prefers_hash() {
        let mut r = result("Show.S01E01.720p", 10);
        r.info_hash = Some("ABC".into());
        assert_eq!(dedupe_key(&r), "hash:abc");
    }

    #[test]
    fn test_key_falls_back_to_title_and_size() {
        let mut a = result("Show.S01E01.720p-GRP", 10);
        let mut b = result("show s01e01 720p grp", 3);
        a.size_bytes = 100;
        b.size_bytes = 100;
        assert_eq!(dedupe_key(&a), dedupe_key(&b));

        b.size_bytes = 101;
        assert_ne!(dedupe_key(&a), dedupe_key(&b));
    }

    #[test]
    fn test_keeps_most_seeded_copy() {
        let mut a = result("Release", 5);
        a.indexer = "a".into();
        a.info_hash = Some("h".into());
        let mut b = result("Release", 9);
        b.indexer = "b".into();
        b.info_hash = Some("h".into());

        let out = deduplicate(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].indexer, "b");
        assert_eq!(out[0].seeders, 9);
    }

    #[test]
    fn test_order_independent() {
        let mut a = result("Release", 5);
        a.indexer = "zeta".into();
        a.info_hash = Some("h".into());
        let mut b = a.clone();
        b.indexer = "alpha".into();

        let one = deduplicate(vec![a.clone(), b.clone()]);
        let two = deduplicate(vec![b, a]);
        assert_eq!(one, two);
        assert_eq!(one[0].indexer, "alpha");
    }

    #[test]
    fn test_idempotent() {
        let mut a = result("One", 5);
        a.info_hash = Some("h1".into());
        let b = a.clone();
        let c = result("Two", 1);

        let once = deduplicate(vec![a, b, c]);
        let twice = deduplicate(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_hashless_copy_joins_hashed_copy() {
        let mut hashed = result("Show.S01E01.1080p", 4);
        hashed.indexer = "a".into();
        hashed.size_bytes = 50;
        hashed.info_hash = Some("ABC".into());
        let mut bare = result("Show S01E01 1080p", 12);
        bare.indexer = "b".into();
        bare.size_bytes = 50;

        let one = deduplicate(vec![hashed.clone(), bare.clone()]);
        let two = deduplicate(vec![bare.clone(), hashed.clone()]);
        assert_eq!(one.len(), 1);
        assert_eq!(one, two);
        assert_eq!(one[0].indexer, "b");
        assert_eq!(one[0].info_hash.as_deref(), Some("ABC"));
        assert_eq!(deduplicate(one.clone()), one);
    }

    #[test]
    fn test_hashless_copy_kept_when_hash_is_ambiguous() {
        let mut first = result("Release", 4);
        first.size_bytes = 50;
        first.info_hash = Some("h1".into());
        let mut second = first.clone();
        second.info_hash = Some("h2".into());
        let mut bare = first.clone();
        bare.info_hash = None;

        assert_eq!(deduplicate(vec![first, second, bare]).len(), 3);
    }

    #[test]
    fn test_merges_earliest_date_and_hash() {
        let mut a = result("Release", 9);
        a.size_bytes = 7;
        a.publish_date = Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        let mut b = result("Release", 1);
        b.size_bytes = 7;
        b.publish_date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let out = deduplicate(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].seeders, 9);
        assert_eq!(
            out[0].publish_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }
}
