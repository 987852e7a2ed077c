//! Deterministic ordering of aggregated results.

use std::cmp::Ordering;

use crate::indexer::SearchResult;

use super::SearchConfig;

const RESOLUTION_WEIGHT: i64 = 1_000;
const SOURCE_WEIGHT: i64 = 100;
const REVISION_BONUS: i64 = 15;
const HDR_BONUS: i64 = 5;
const PREFERRED_BONUS: i64 = 50;
const BLOCKED_PENALTY: i64 = 100_000;

/// Scores a result's quality and tag matches.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    preferred: Vec<String>,
    blocked: Vec<String>,
}

impl QualityScorer {
    pub fn new(preferred: &[String], blocked: &[String]) -> Self {
        let lower = |tags: &[String]| {
            tags.iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        };
        Self {
            preferred: lower(preferred),
            blocked: lower(blocked),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(&config.preferred_tags, &config.blocked_tags)
    }

    /// Higher is better. Monotonic in resolution tier, source tier,
    /// proper/repack and preferred tag matches; any blocked tag sinks it.
    pub fn score(&self, result: &SearchResult) -> i64 {
        let quality = &result.quality;
        let title = result.title.to_lowercase();

        let mut score = quality.resolution.map(|r| r.rank() as i64).unwrap_or(0) * RESOLUTION_WEIGHT
            + quality.source.map(|s| s.rank() as i64).unwrap_or(0) * SOURCE_WEIGHT
            + quality.revision() as i64 * REVISION_BONUS;

        if quality.hdr.is_some() {
            score += HDR_BONUS;
        }
        score += self.preferred.iter().filter(|t| title.contains(t.as_str())).count() as i64
            * PREFERRED_BONUS;
        if self.blocked.iter().any(|t| title.contains(t.as_str())) {
            score -= BLOCKED_PENALTY;
        }
        score
    }
}

/// Sort by quality score, then seeders, then recency (unknown dates last).
///
/// Title and provider name break remaining ties so the order is a pure
/// function of the set.
pub fn rank(results: &mut [SearchResult], scorer: &QualityScorer) {
    let mut scored: Vec<(i64, SearchResult)> = results
        .iter()
        .map(|r| (scorer.score(r), r.clone()))
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| {
        sb.cmp(sa)
            .then_with(|| b.seeders.cmp(&a.seeders))
            .then_with(|| match (a.publish_date, b.publish_date) {
                (Some(da), Some(db)) => db.cmp(&da),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.indexer.cmp(&b.indexer))
    });

    for (slot, (_, result)) in results.iter_mut().zip(scored) {
        *slot = result;
    }
}
