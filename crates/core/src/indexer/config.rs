use serde::{Deserialize, Serialize};

/// Provider implementations known to the registry.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexerKind {
    Jackett,
}

/// One configured search provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerConfig {
    #[serde(rename = "type")]
    pub kind: IndexerKind,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Higher is preferred when results tie.
    #[serde(default)]
    pub priority: i32,
    /// Base URL of the provider (e.g. "http://localhost:9117").
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Provider-side indexer id. Jackett uses "all" for its aggregate.
    #[serde(default = "default_indexer_id")]
    pub indexer: String,
    /// Minimum delay between two requests to this provider.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Hard cap on requests (including retries) per search call.
    #[serde(default = "default_request_budget")]
    pub request_budget: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Restrict searches to these category ids.
    #[serde(default)]
    pub categories: Vec<u32>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_true() -> bool {
    true
}

fn default_indexer_id() -> String {
    "all".to_string()
}

fn default_min_interval_ms() -> u64 {
    2_000
}

fn default_request_budget() -> u32 {
    4
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let toml = r#"
type = "jackett"
name = "jackett-public"
endpoint = "http://localhost:9117"
"#;
        let config: IndexerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.kind, IndexerKind::Jackett);
        assert!(config.enabled);
        assert_eq!(config.indexer, "all");
        assert_eq!(config.min_interval_ms, 2_000);
        assert_eq!(config.request_budget, 4);
        assert!(config.categories.is_empty());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let toml = r#"
type = "gopher"
name = "x"
endpoint = "http://localhost"
"#;
        assert!(toml::from_str::<IndexerConfig>(toml).is_err());
    }
}
