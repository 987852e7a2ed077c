//! Best-pick: the top-ranked result that actually is what was asked for.

use crate::indexer::SearchResult;
use crate::metadata::normalize_title;
use crate::release::parse_release;

/// What a result must be to be picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickCriteria {
    /// A whole-season release.
    SeasonPack { title: String, season: u32 },
    /// A release containing this episode.
    Episode {
        title: String,
        season: u32,
        episode: u32,
    },
    /// A non-episodic release, same year when both sides know it.
    Movie { title: String, year: Option<u16> },
}

impl PickCriteria {
    fn title(&self) -> &str {
        match self {
            PickCriteria::SeasonPack { title, .. }
            | PickCriteria::Episode { title, .. }
            | PickCriteria::Movie { title, .. } => title,
        }
    }

    pub fn matches(&self, result: &SearchResult) -> bool {
        let info = parse_release(&result.title);
        if normalize_title(&info.title) != normalize_title(self.title()) {
            return false;
        }
        match self {
            PickCriteria::SeasonPack { season, .. } => {
                info.season == Some(*season) && info.is_season_pack()
            }
            PickCriteria::Episode {
                season, episode, ..
            } => info.covers_episode(*season, *episode),
            PickCriteria::Movie { year, .. } => {
                info.season.is_none()
                    && match (year, info.year) {
                        (Some(want), Some(have)) => *want == have,
                        _ => true,
                    }
            }
        }
    }
}

/// First result in `ranked` order matching `criteria`.
pub fn best_pick<'a>(ranked: &'a [SearchResult], criteria: &PickCriteria) -> Option<&'a SearchResult> {
    ranked.iter().find(|r| criteria.matches(r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::result;

    #[test]
    fn test_season_pack_skips_single_episodes() {
        let ranked = vec![
            result("Show.S01E01.2160p.WEB-DL", 100),
            result("Other.Show.S01.1080p", 50),
            result("Show.S01.1080p.BluRay", 20),
        ];
        let pick = best_pick(
            &ranked,
            &PickCriteria::SeasonPack {
                title: "Show".into(),
                season: 1,
            },
        );
        assert_eq!(pick.unwrap().title, "Show.S01.1080p.BluRay");
    }

    #[test]
    fn test_episode_needs_exact_season_and_episode() {
        let ranked = vec![
            result("Show.S02E03.1080p", 10),
            result("Show.S01.1080p", 10),
            result("Show.S01E03.720p", 10),
        ];
        let criteria = PickCriteria::Episode {
            title: "Show".into(),
            season: 1,
            episode: 3,
        };
        assert_eq!(best_pick(&ranked, &criteria).unwrap().title, "Show.S01E03.720p");
    }

    #[test]
    fn test_movie_year() {
        let ranked = vec![
            result("Heat.2030.2160p", 10),
            result("Heat.1995.1080p.BluRay", 10),
        ];
        let criteria = PickCriteria::Movie {
            title: "Heat".into(),
            year: Some(1995),
        };
        assert_eq!(best_pick(&ranked, &criteria).unwrap().title, "Heat.1995.1080p.BluRay");
    }

    #[test]
    fn test_no_match() {
        let ranked = vec![result("Something.Else.S01E01", 10)];
        let criteria = PickCriteria::Episode {
            title: "Show".into(),
            season: 1,
            episode: 1,
        };
        assert!(best_pick(&ranked, &criteria).is_none());
    }
}
