//! Capacity Aggregation & Attribution Engine
//!
//! Turns heterogeneous per-account inventories into one normalized
//! capacity census: how many resources of each workload kind exist, where
//! they live, how many bytes each holds, and how much of it already has a
//! backup.
//!
//! # Features
//!
//! - Byte-exact accumulation keyed by (workload kind, region)
//! - Parent attribution: attached disks roll into their VM, storage
//!   sub-services into their account, orphans into their own bucket
//! - Storage hierarchy modes that never double count an account and its
//!   sub-services
//! - Telemetry fallback chain for kinds without a declared size
//! - Protection correlation with a proportional protected-size estimate
//! - Deterministic salted pseudonyms for resource group and object names
//! - Completeness and data quality tables next to the totals
//!
//! # Example
//!
//! ```rust,ignore
//! use cloud_census::capacity::{aggregate, EngineSettings, NoTelemetry, ResourceRecord, WorkloadKind};
//! use cloud_census::capacity::units::ByteUnit;
//!
//! let vm = ResourceRecord::new(WorkloadKind::VirtualMachine, "/vm/app01", "eastus");
//! let disk = ResourceRecord::new(WorkloadKind::ManagedDisk, "/disk/os", "eastus")
//!     .with_parent("/vm/app01")
//!     .with_declared(128.0, ByteUnit::Gibibytes);
//!
//! let report = aggregate(EngineSettings::default(), [vm, disk], [], &NoTelemetry);
//! assert_eq!(report.total_bytes(), 128 * 1024 * 1024 * 1024);
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Engine settings.
pub mod config;

/// Core data types.
pub mod types;

/// Byte unit conversion.
pub mod units;

// ============================================================================
// Pipeline stages
// ============================================================================

/// Capacity resolution with telemetry fallback.
pub mod resolver;

/// Parent attribution and storage hierarchy gating.
pub mod router;

/// Concurrent (workload, region) accumulator.
pub mod store;

/// Backup protection correlation.
pub mod protection;

/// Salted name pseudonyms.
pub mod pseudonym;

/// Report tables.
pub mod report;

/// Run orchestration.
pub mod engine;

/// Output formatting (table, JSON, YAML, CSV).
pub mod formatter;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{EngineSettings, StorageAggregationMode};
pub use engine::{AccountSink, CensusEngine, aggregate};
pub use formatter::{OutputFormat, format_report, format_report_to_string};
pub use protection::ProtectionRow;
pub use pseudonym::{AnonymizeScope, PseudonymScope, Pseudonymizer};
pub use report::{CapacityReport, RegionWorkloadRow, ReportMetadata, ResourceDetail};
pub use resolver::{
    CapacityProbe, MetricQuery, NoTelemetry, ProbeError, ProbeResult, Resolution, ResolutionStep,
};
pub use store::{AggregationStore, CompletenessRow, WorkloadTotal};
pub use types::{
    AggregateCell, AggregateKey, CapacityHint, DataQualityNote, NoteKind, ProtectionRecord,
    ProtectionSource, RawResource, RecordSkip, ResourceRecord, RollupPolicy, SkipReason,
    WorkloadKind,
};
