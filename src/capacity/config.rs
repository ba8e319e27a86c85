//! Settings consumed by the aggregation engine.

use super::pseudonym::AnonymizeScope;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which figure of a storage account hierarchy contributes bytes.
///
/// Exactly one mode is active per run; the account-level figure and its
/// sub-service figures are never summed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageAggregationMode {
    /// Only the account-level number is added; sub-services are detail only
    AccountLevel,
    /// Each sub-service adds its own number; the account is detail only
    #[default]
    ServiceLevel,
}

impl StorageAggregationMode {
    /// Parse from string (case-insensitive, `-`/`_` tolerant).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "account_level" | "accountlevel" | "account" => Some(Self::AccountLevel),
            "service_level" | "servicelevel" | "service" => Some(Self::ServiceLevel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountLevel => "account-level",
            Self::ServiceLevel => "service-level",
        }
    }
}

impl fmt::Display for StorageAggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Which name scopes are pseudonymized (default: None)
    pub anonymize_scope: AnonymizeScope,

    /// Salt for pseudonyms; generated per run when absent
    pub anonymize_salt: Option<String>,

    /// Storage hierarchy mode (default: ServiceLevel)
    pub storage_mode: StorageAggregationMode,

    /// Emit one detail row per resource
    pub include_details: bool,
}

impl EngineSettings {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anonymize(mut self, scope: AnonymizeScope) -> Self {
        self.anonymize_scope = scope;
        self
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.anonymize_salt = Some(salt.into());
        self
    }

    pub fn with_storage_mode(mut self, mode: StorageAggregationMode) -> Self {
        self.storage_mode = mode;
        self
    }

    pub fn with_details(mut self) -> Self {
        self.include_details = true;
        self
    }
}
