use thiserror::Error;

/// Top-level error for the census CLI and library entry points.
///
/// Nothing inside the aggregation core returns this type: missing
/// capacity, orphaned parents and malformed records are reported as data
/// quality rows instead. These errors only come from the outer surfaces
/// (configuration, snapshot files, output writing).
#[derive(Debug, Error)]
pub enum CensusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Collector error: {0}")]
    Collector(#[from] CollectorError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ParsingFailed(String),

    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },
}

/// Failure of an external enumeration call.
///
/// The core never aborts on these; they surface as reduced completeness and
/// a data quality note for the affected account.
#[derive(Debug, Clone, Error)]
pub enum CollectorError {
    #[error("Enumeration of {workload} failed: {message}")]
    Enumeration { workload: String, message: String },

    #[error("Collection for account {account} timed out after {seconds}s")]
    Timeout { account: String, seconds: u64 },

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, CensusError>;
