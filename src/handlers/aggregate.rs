//! Handler for the `aggregate` command.
//!
//! Replays an inventory snapshot through the account worker pool and renders
//! the resulting capacity report.

use crate::capacity::{
    AnonymizeScope, CapacityReport, CensusEngine, EngineSettings, OutputFormat,
    StorageAggregationMode, format_report_to_string,
};
use crate::collector::{CollectionLimits, SnapshotCollector, load_snapshot, run_collectors};
use crate::config::types::Config;
use crate::error::{CensusError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the aggregate command
#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    /// Inventory snapshot to replay
    pub snapshot: PathBuf,
    /// Output format; falls back to `[output] format`
    pub format: Option<String>,
    /// Output file
    pub output: Option<PathBuf>,
    /// Anonymize scope; falls back to `[anonymize] scope`
    pub anonymize: Option<String>,
    /// Pseudonym salt; falls back to `[anonymize] salt`
    pub salt: Option<String>,
    /// Storage mode; falls back to `[storage] aggregation_mode`
    pub storage_mode: Option<String>,
    /// Concurrent accounts; falls back to `[collection]`
    pub max_concurrency: Option<usize>,
    /// Per-account timeout in seconds; falls back to `[collection]`
    pub timeout: Option<u64>,
    /// Include per-resource rows
    pub details: bool,
}

impl AggregateOptions {
    /// Merge flags over the config file into engine settings.
    pub fn engine_settings(&self, config: &Config) -> Result<EngineSettings> {
        let scope = match &self.anonymize {
            Some(s) => AnonymizeScope::parse(s).ok_or_else(|| {
                CensusError::InvalidInput(format!("unknown anonymize scope '{}'", s))
            })?,
            None => config.anonymize.scope()?,
        };
        let mode = match &self.storage_mode {
            Some(s) => StorageAggregationMode::parse(s).ok_or_else(|| {
                CensusError::InvalidInput(format!("unknown storage mode '{}'", s))
            })?,
            None => config.storage.aggregation_mode()?,
        };

        let mut settings = EngineSettings::new()
            .with_anonymize(scope)
            .with_storage_mode(mode);
        if let Some(salt) = self.salt.as_ref().or(config.anonymize.salt.as_ref()) {
            settings = settings.with_salt(salt.clone());
        }
        if self.details {
            settings = settings.with_details();
        }
        Ok(settings)
    }

    pub fn limits(&self, config: &Config) -> CollectionLimits {
        CollectionLimits::new(
            self.max_concurrency
                .unwrap_or(config.collection.max_concurrent_accounts),
            self.timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.collection.account_timeout()),
        )
    }

    pub fn output_format(&self, config: &Config) -> Result<OutputFormat> {
        match &self.format {
            Some(s) => OutputFormat::parse(s)
                .ok_or_else(|| CensusError::InvalidInput(format!("unknown output format '{}'", s))),
            None => Ok(config.output.format()?),
        }
    }
}

/// Build the report without rendering it.
pub async fn build_report(options: &AggregateOptions, config: &Config) -> Result<CapacityReport> {
    let settings = options.engine_settings(config)?;
    let limits = options.limits(config);

    let snapshot = load_snapshot(&options.snapshot)?;
    let collectors = SnapshotCollector::from_snapshot(snapshot);
    log::info!(
        "Aggregating {} accounts from {} (mode: {}, anonymize: {})",
        collectors.len(),
        options.snapshot.display(),
        settings.storage_mode,
        settings.anonymize_scope
    );

    let engine = CensusEngine::new(settings);
    run_collectors(&engine, &collectors, &limits).await;
    Ok(engine.finish())
}

/// Handle the `aggregate` command.
pub async fn handle_aggregate(options: AggregateOptions, config: &Config) -> Result<()> {
    let format = options.output_format(config)?;
    let report = build_report(&options, config).await?;

    if report.has_data_quality_issues() {
        log::warn!(
            "{} skipped records and {} data quality notes; see the Data Quality section",
            report.skipped.len(),
            report.data_quality.len()
        );
    }

    if let Some(output_path) = &options.output {
        colored::control::set_override(false);
        let output = format_report_to_string(&report, format);
        colored::control::unset_override();
        std::fs::write(output_path, output)?;
        println!("Report written to: {}", output_path.display());
    } else {
        println!("{}", format_report_to_string(&report, format));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{AnonymizeConfig, CollectionConfig, StorageConfig};

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            anonymize: AnonymizeConfig {
                scope: Some("objects".into()),
                salt: Some("file-salt".into()),
            },
            storage: StorageConfig {
                aggregation_mode: Some("account-level".into()),
            },
            collection: CollectionConfig {
                max_concurrent_accounts: 2,
                account_timeout_secs: 60,
            },
            ..Default::default()
        };
        let options = AggregateOptions {
            anonymize: Some("all".into()),
            max_concurrency: Some(9),
            ..Default::default()
        };

        let settings = options.engine_settings(&config).unwrap();
        assert_eq!(settings.anonymize_scope, AnonymizeScope::All);
        assert_eq!(settings.anonymize_salt.as_deref(), Some("file-salt"));
        assert_eq!(settings.storage_mode, StorageAggregationMode::AccountLevel);

        let limits = options.limits(&config);
        assert_eq!(limits.max_concurrent_accounts, 9);
        assert_eq!(limits.account_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_flag_value_is_invalid_input() {
        let options = AggregateOptions {
            storage_mode: Some("both".into()),
            ..Default::default()
        };
        let err = options.engine_settings(&Config::default()).unwrap_err();
        assert!(matches!(err, CensusError::InvalidInput(_)));
    }
}
