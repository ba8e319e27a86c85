use crate::capacity::{AnonymizeScope, OutputFormat, StorageAggregationMode};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub anonymize: AnonymizeConfig,
    pub storage: StorageConfig,
    pub collection: CollectionConfig,
    pub output: OutputConfig,
}

/// Pseudonymization of names in the report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymizeConfig {
    /// none | resource-groups | objects | all
    pub scope: Option<String>,
    /// Keep the same salt across runs to get the same pseudonyms
    pub salt: Option<String>,
}

/// Storage hierarchy handling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// account-level | service-level
    pub aggregation_mode: Option<String>,
}

/// Account worker pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub max_concurrent_accounts: usize,
    pub account_timeout_secs: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_accounts: 4,
            account_timeout_secs: 300,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// table | json | yaml | csv
    pub format: Option<String>,
}

impl AnonymizeConfig {
    pub fn scope(&self) -> Result<AnonymizeScope, ConfigError> {
        match self.scope.as_deref() {
            None => Ok(AnonymizeScope::default()),
            Some(s) => AnonymizeScope::parse(s).ok_or_else(|| invalid("anonymize.scope", s)),
        }
    }
}

impl StorageConfig {
    pub fn aggregation_mode(&self) -> Result<StorageAggregationMode, ConfigError> {
        match self.aggregation_mode.as_deref() {
            None => Ok(StorageAggregationMode::default()),
            Some(s) => StorageAggregationMode::parse(s)
                .ok_or_else(|| invalid("storage.aggregation_mode", s)),
        }
    }
}

impl CollectionConfig {
    pub fn account_timeout(&self) -> Duration {
        Duration::from_secs(self.account_timeout_secs)
    }
}

impl OutputConfig {
    pub fn format(&self) -> Result<OutputFormat, ConfigError> {
        match self.format.as_deref() {
            None => Ok(OutputFormat::default()),
            Some(s) => OutputFormat::parse(s).ok_or_else(|| invalid("output.format", s)),
        }
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
