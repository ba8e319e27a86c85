//! # Cloud Census
//!
//! Inventories cloud resources across accounts and rolls them up into a
//! capacity census by workload kind and region.
//!
//! ## Features
//!
//! - **No double counting**: disks roll into their VM, storage sub-services
//!   into their account, under exactly one storage aggregation mode
//! - **Telemetry fallback**: capacity resolved through an ordered probe chain
//! - **Protection coverage**: backup-protected items correlated per cell
//! - **Reproducible anonymization**: salted one-way pseudonyms for names
//! - **Multiple formats**: table, JSON, YAML and CSV output
//!
//! ## Example
//!
//! ```rust,no_run
//! use cloud_census::capacity::{CensusEngine, EngineSettings, format_report_to_string, OutputFormat};
//! use cloud_census::collector::{CollectionLimits, SnapshotCollector, load_snapshot, run_collectors};
//! use std::path::Path;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let snapshot = load_snapshot(Path::new("inventory.json"))?;
//! let collectors = SnapshotCollector::from_snapshot(snapshot);
//! let engine = CensusEngine::new(EngineSettings::default());
//! run_collectors(&engine, &collectors, &CollectionLimits::default()).await;
//! let report = engine.finish();
//! println!("{}", format_report_to_string(&report, OutputFormat::Table));
//! # Ok(())
//! # }
//! ```

pub mod capacity;
pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod handlers;

// Re-export commonly used types and functions
pub use capacity::{CapacityReport, CensusEngine, EngineSettings, aggregate};
pub use error::{CensusError, Result};
pub use handlers::*;
use cli::Commands;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn run_command(command: Commands, config: &config::types::Config) -> Result<()> {
    match command {
        Commands::Aggregate {
            snapshot,
            format,
            output,
            anonymize,
            salt,
            storage_mode,
            max_concurrency,
            timeout,
            details,
        } => {
            let options = AggregateOptions {
                snapshot,
                format,
                output,
                anonymize,
                salt,
                storage_mode,
                max_concurrency,
                timeout,
                details,
            };
            handle_aggregate(options, config).await
        }
        Commands::Salt => handle_salt(),
    }
}
