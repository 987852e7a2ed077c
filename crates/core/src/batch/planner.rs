use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ledger::{AcquisitionTarget, BatchTarget};
use crate::library::{FileOwner, LibraryError, LibraryStore};
use crate::metadata::{MediaItem, MetadataError, MetadataProvider, SubItem};

use super::BatchConfig;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

/// One search to run and how to tag what it finds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedSearch {
    pub query: String,
    pub season: u32,
    /// `None` for a season-pack search.
    pub episode: Option<u32>,
    pub target: AcquisitionTarget,
    pub batch: BatchTarget,
}

impl PlannedSearch {
    pub fn is_season_pack(&self) -> bool {
        self.batch.is_batch()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonPlan {
    pub season: u32,
    pub total: usize,
    pub missing: usize,
    pub missing_fraction: f64,
    pub searches: Vec<PlannedSearch>,
}

/// Plan the searches for one season.
///
/// `missing` are the season's sub-items with neither a library file nor an
/// acquisition in flight. At or
/// above `threshold` a single `{Parent} S{NN}` search is planned for all of
/// them; below it, one `{Parent} S{NN}E{MM}` search per missing sub-item.
pub fn plan_season(
    parent: &MediaItem,
    season: u32,
    total: usize,
    missing: &[&SubItem],
    threshold: f64,
) -> SeasonPlan {
    let missing_fraction = if total == 0 {
        0.0
    } else {
        missing.len() as f64 / total as f64
    };

    let searches = if missing.is_empty() {
        Vec::new()
    } else if missing_fraction >= threshold {
        vec![PlannedSearch {
            query: format!("{} S{:02}", parent.title, season),
            season,
            episode: None,
            target: AcquisitionTarget::item(parent.id.clone()),
            batch: BatchTarget::Batch {
                sub_item_ids: missing.iter().map(|s| s.id.clone()).collect(),
            },
        }]
    } else {
        missing
            .iter()
            .map(|sub| PlannedSearch {
                query: format!("{} S{:02}E{:02}", parent.title, sub.season, sub.episode),
                season: sub.season,
                episode: Some(sub.episode),
                target: AcquisitionTarget::sub_item(sub.id.clone()),
                batch: BatchTarget::Single,
            })
            .collect()
    };

    SeasonPlan {
        season,
        total,
        missing: missing.len(),
        missing_fraction,
        searches,
    }
}

/// Looks up what a series is missing and plans the searches for it.
pub struct BatchPlanner {
    config: BatchConfig,
    metadata: Arc<dyn MetadataProvider>,
    library: Arc<dyn LibraryStore>,
}

impl BatchPlanner {
    pub fn new(
        config: BatchConfig,
        metadata: Arc<dyn MetadataProvider>,
        library: Arc<dyn LibraryStore>,
    ) -> Self {
        Self {
            config,
            metadata,
            library,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    /// One plan per season of `item_id`, in season order. `season` narrows
    /// to a single season. Sub-items in `in_flight` are already being
    /// acquired and never count as missing.
    pub async fn plan(
        &self,
        item_id: &str,
        season: Option<u32>,
        in_flight: &HashSet<String>,
    ) -> Result<Vec<SeasonPlan>, BatchError> {
        let parent = self.metadata.item(item_id).await?;
        let sub_items = self.metadata.sub_items(item_id).await?;

        let mut seasons: BTreeMap<u32, Vec<SubItem>> = BTreeMap::new();
        for sub in sub_items {
            if season.map_or(true, |s| s == sub.season) {
                seasons.entry(sub.season).or_default().push(sub);
            }
        }

        let mut plans = Vec::with_capacity(seasons.len());
        for (number, subs) in &seasons {
            let mut missing = Vec::new();
            for sub in subs {
                if in_flight.contains(&sub.id) {
                    continue;
                }
                let owner = FileOwner::SubItem {
                    sub_item_id: sub.id.clone(),
                };
                if self.library.find_by_owner(&owner)?.is_empty() {
                    missing.push(sub);
                }
            }
            let plan = plan_season(&parent, *number, subs.len(), &missing, self.config.threshold);
            debug!(
                item_id = %item_id,
                season = number,
                missing = plan.missing,
                total = plan.total,
                searches = plan.searches.len(),
                "Planned season"
            );
            plans.push(plan);
        }
        Ok(plans)
    }
}
