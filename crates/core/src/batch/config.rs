use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Fraction of a season's sub-items that must be missing before a
    /// single season-pack search replaces per-episode searches.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.7
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}
