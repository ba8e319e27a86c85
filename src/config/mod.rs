pub mod types;

use crate::error::{ConfigError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".census.toml";

/// Get the global config file path (~/.census.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Get the local config file path (dir/.census.toml)
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Read and parse one config file; errors are returned.
pub fn read_config(path: &Path) -> Result<types::Config> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
        path: path.display().to_string(),
        source,
    })?;
    let config = toml::from_str(&content)
        .map_err(|e| ConfigError::ParsingFailed(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Load configuration.
///
/// An explicit path must exist and parse. Otherwise checks the local config
/// first, then the global config, and falls back to defaults.
pub fn load_config(explicit: Option<&Path>, local_dir: Option<&Path>) -> Result<types::Config> {
    if let Some(path) = explicit {
        log::debug!("Loading config from {}", path.display());
        return read_config(path);
    }

    let candidates = local_dir
        .map(local_config_path)
        .into_iter()
        .chain(global_config_path());
    for path in candidates {
        if !path.exists() {
            continue;
        }
        match read_config(&path) {
            Ok(config) => {
                log::debug!("Loaded config from {}", path.display());
                return Ok(config);
            }
            Err(e) => log::warn!("Ignoring config {}: {}", path.display(), e),
        }
    }

    Ok(types::Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{AnonymizeScope, OutputFormat, StorageAggregationMode};
    use crate::error::CensusError;

    #[test]
    fn test_explicit_config_parses_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("census.toml");
        fs::write(
            &path,
            r#"
[anonymize]
scope = "all"
salt = "pepper"

[storage]
aggregation_mode = "account-level"

[collection]
max_concurrent_accounts = 8

[output]
format = "csv"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path), None).unwrap();
        assert_eq!(config.anonymize.scope().unwrap(), AnonymizeScope::All);
        assert_eq!(config.anonymize.salt.as_deref(), Some("pepper"));
        assert_eq!(
            config.storage.aggregation_mode().unwrap(),
            StorageAggregationMode::AccountLevel
        );
        assert_eq!(config.collection.max_concurrent_accounts, 8);
        assert_eq!(config.collection.account_timeout_secs, 300);
        assert_eq!(config.output.format().unwrap(), OutputFormat::Csv);
    }

    #[test]
    fn test_local_config_is_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(local_config_path(dir.path()), "[output]\nformat = \"json\"\n").unwrap();
        let config = load_config(None, Some(dir.path())).unwrap();
        assert_eq!(config.output.format().unwrap(), OutputFormat::Json);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope.toml")), None).unwrap_err();
        assert!(matches!(
            err,
            CensusError::Config(ConfigError::ReadFailed { .. })
        ));
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let config: types::Config =
            toml::from_str("[storage]\naggregation_mode = \"both\"\n").unwrap();
        let err = config.storage.aggregation_mode().unwrap_err();
        assert!(err.to_string().contains("storage.aggregation_mode"));
    }
}
