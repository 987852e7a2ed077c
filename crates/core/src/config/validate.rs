use std::collections::HashSet;

use super::{types::Config, ConfigError};

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn check_names<'a>(
    section: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(invalid(format!("{}: name cannot be empty", section)));
        }
        if !seen.insert(name) {
            return Err(invalid(format!("{}: duplicate name '{}'", section, name)));
        }
    }
    Ok(())
}

/// Validate configuration
///
/// Rejects empty or duplicate indexer/client names, zero ports, intervals,
/// timeouts and pool sizes, a batch threshold outside (0, 1] and an empty
/// library root. Unknown `type` values are already rejected by serde.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.search.max_concurrency == 0 {
        return Err(invalid("search.max_concurrency must be at least 1"));
    }
    if config.search.indexer_timeout_ms == 0 {
        return Err(invalid("search.indexer_timeout_ms cannot be 0"));
    }

    check_names("indexers", config.indexers.iter().map(|i| i.name.as_str()))?;
    for indexer in &config.indexers {
        if indexer.endpoint.trim().is_empty() {
            return Err(invalid(format!("indexer '{}': endpoint is required", indexer.name)));
        }
        if indexer.request_budget == 0 {
            return Err(invalid(format!(
                "indexer '{}': request_budget must be at least 1",
                indexer.name
            )));
        }
        if indexer.timeout_secs == 0 {
            return Err(invalid(format!("indexer '{}': timeout_secs cannot be 0", indexer.name)));
        }
    }

    check_names("clients", config.clients.iter().map(|c| c.name.as_str()))?;
    for client in &config.clients {
        if client.port == 0 {
            return Err(invalid(format!("client '{}': port cannot be 0", client.name)));
        }
        if client.timeout_secs == 0 {
            return Err(invalid(format!("client '{}': timeout_secs cannot be 0", client.name)));
        }
    }

    if config.monitor.poll_interval_ms == 0 {
        return Err(invalid("monitor.poll_interval_ms cannot be 0"));
    }
    if config.monitor.max_concurrent_polls == 0 {
        return Err(invalid("monitor.max_concurrent_polls must be at least 1"));
    }
    if config.monitor.client_timeout_secs == 0 {
        return Err(invalid("monitor.client_timeout_secs cannot be 0"));
    }

    if config.import.library_root.as_os_str().is_empty() {
        return Err(invalid("import.library_root is required"));
    }
    if config.import.max_concurrent == 0 {
        return Err(invalid("import.max_concurrent must be at least 1"));
    }
    if config.import.buffer_size == 0 {
        return Err(invalid("import.buffer_size cannot be 0"));
    }

    let threshold = config.batch.threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(invalid(format!(
            "batch.threshold must be in (0, 1], got {}",
            threshold
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base() -> Config {
        load_config_from_str(
            r#"
[import]
library_root = "/library"

[[indexers]]
type = "jackett"
name = "a"
endpoint = "http://localhost:9117"

[[clients]]
type = "qbittorrent"
name = "qb"
port = 8080
"#,
        )
        .unwrap()
    }

    fn assert_invalid(config: &Config, needle: &str) {
        match validate_config(config) {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains(needle), "'{}' does not mention '{}'", msg, needle)
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = base();
        config.server.port = 0;
        assert_invalid(&config, "server.port");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = base();
        config.clients.push(config.clients[0].clone());
        assert_invalid(&config, "duplicate name 'qb'");

        let mut config = base();
        config.indexers[0].name = " ".into();
        assert_invalid(&config, "name cannot be empty");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = base();
        config.monitor.poll_interval_ms = 0;
        assert_invalid(&config, "poll_interval_ms");
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = base();
        config.batch.threshold = 0.0;
        assert_invalid(&config, "batch.threshold");

        config.batch.threshold = 1.5;
        assert_invalid(&config, "batch.threshold");

        config.batch.threshold = 1.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_library_root_rejected() {
        let mut config = base();
        config.import.library_root = Default::default();
        assert_invalid(&config, "library_root");
    }
}
