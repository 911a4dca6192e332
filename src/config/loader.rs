//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// The target URL is not required to be present in the file; the CLI may
/// supply it afterwards, so only the fields that are present are validated
/// here. Full validation runs again in `main` once overrides are applied.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ProxyConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    if !config.upstream.target_url.is_empty() {
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_partial_config_with_defaults() {
        let mut file = tempfile_path("partial.toml");
        write!(
            file.1,
            "[upstream]\ntarget_url = \"http://127.0.0.1:3000\"\n\n[cache]\nttl_secs = 5\n"
        )
        .unwrap();

        let config = load_config(&file.0).unwrap();
        assert_eq!(config.upstream.target_url, "http://127.0.0.1:3000");
        assert_eq!(config.cache.ttl_secs, 5);
        // untouched sections keep their defaults
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
        assert_eq!(config.upstream.flush_interval_ms, 10);

        std::fs::remove_file(&file.0).unwrap_or_default();
    }

    #[test]
    fn rejects_malformed_toml() {
        let mut file = tempfile_path("broken.toml");
        write!(file.1, "[upstream\ntarget_url = 3").unwrap();

        match load_config(&file.0) {
            Err(ConfigError::Parse(_)) => {}
            other => panic!("expected parse error, got {:?}", other.map(|_| ())),
        }

        std::fs::remove_file(&file.0).unwrap_or_default();
    }

    fn tempfile_path(name: &str) -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!("caching-proxy-test-{}", name));
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }
}
