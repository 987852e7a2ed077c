//! Batch resolution.
//!
//! Decides, per season, whether the missing episodes of a series are
//! fetched as one season pack or one search per episode.

mod config;
mod planner;

pub use config::BatchConfig;
pub use planner::{plan_season, BatchError, BatchPlanner, PlannedSearch, SeasonPlan};
