//! Core data types for the capacity census.
//!
//! These types describe discovered resources, the aggregation keys their
//! capacity lands under, and the backup protection records correlated against
//! them.

use super::units::ByteUnit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Region label used when a resource reports no location.
pub const UNKNOWN_REGION: &str = "Unknown";

// ============================================================================
// Workload Kind
// ============================================================================

/// Category tag for a resource type; one axis of aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WorkloadKind {
    VirtualMachine,
    /// Disk owned by a virtual machine
    ManagedDisk,
    /// Disk with no owning virtual machine
    UnattachedDisk,
    StorageAccount,
    BlobStorage,
    FileShare,
    TableService,
    QueueService,
    DataLakeStorage,
    SqlDatabase,
    SqlManagedInstance,
    CosmosAccount,
    MySqlServer,
    PostgreSqlServer,
    SynapseSqlPool,
    NetAppVolume,
    BackupVault,
    RecoveryServicesVault,
    /// Any tag the catalogue does not know about
    Other(String),
}

/// Telemetry metric used to observe a workload's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    /// Metric name in the telemetry subsystem
    pub name: &'static str,
    /// Dimension the sub-identity label filters on, if the metric has one
    pub dimension: Option<&'static str>,
}

/// Position of a workload in the storage account hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageRole {
    /// Account-level aggregate covering every sub-service
    Account,
    /// Blob/file/table/queue/ADLS sub-service of an account
    Service,
    /// Not part of a storage account
    Standalone,
}

const KNOWN: [WorkloadKind; 18] = [
    WorkloadKind::VirtualMachine,
    WorkloadKind::ManagedDisk,
    WorkloadKind::UnattachedDisk,
    WorkloadKind::StorageAccount,
    WorkloadKind::BlobStorage,
    WorkloadKind::FileShare,
    WorkloadKind::TableService,
    WorkloadKind::QueueService,
    WorkloadKind::DataLakeStorage,
    WorkloadKind::SqlDatabase,
    WorkloadKind::SqlManagedInstance,
    WorkloadKind::CosmosAccount,
    WorkloadKind::MySqlServer,
    WorkloadKind::PostgreSqlServer,
    WorkloadKind::SynapseSqlPool,
    WorkloadKind::NetAppVolume,
    WorkloadKind::BackupVault,
    WorkloadKind::RecoveryServicesVault,
];

impl WorkloadKind {
    /// Parse a tag or display label (case-insensitive). Unknown values become
    /// [`WorkloadKind::Other`]; blank values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        let found = KNOWN.iter().find(|kind| {
            kind.tag().eq_ignore_ascii_case(trimmed) || kind.label().eq_ignore_ascii_case(trimmed)
        });
        Some(match found {
            Some(kind) => kind.clone(),
            None => Self::Other(trimmed.to_string()),
        })
    }

    /// Stable machine tag.
    pub fn tag(&self) -> &str {
        match self {
            Self::VirtualMachine => "VirtualMachine",
            Self::ManagedDisk => "ManagedDisk",
            Self::UnattachedDisk => "UnattachedDisk",
            Self::StorageAccount => "StorageAccount",
            Self::BlobStorage => "BlobService",
            Self::FileShare => "FileShare",
            Self::TableService => "TableService",
            Self::QueueService => "QueueService",
            Self::DataLakeStorage => "DataLakeStorage",
            Self::SqlDatabase => "SqlDatabase",
            Self::SqlManagedInstance => "SqlManagedInstance",
            Self::CosmosAccount => "CosmosAccount",
            Self::MySqlServer => "MySqlServer",
            Self::PostgreSqlServer => "PostgreSqlServer",
            Self::SynapseSqlPool => "SynapseSqlPool",
            Self::NetAppVolume => "NetAppVolume",
            Self::BackupVault => "BackupVault",
            Self::RecoveryServicesVault => "RecoveryServicesVault",
            Self::Other(tag) => tag,
        }
    }

    /// Human label used in report tables.
    pub fn label(&self) -> &str {
        match self {
            Self::VirtualMachine => "Azure VM",
            Self::ManagedDisk => "Managed Disk",
            Self::UnattachedDisk => "Unattached Disk",
            Self::StorageAccount => "Storage Account",
            Self::BlobStorage => "Blob Storage",
            Self::FileShare => "Azure Files",
            Self::TableService => "Table Storage",
            Self::QueueService => "Queue Storage",
            Self::DataLakeStorage => "ADLS Gen2",
            Self::SqlDatabase => "Azure SQL Database",
            Self::SqlManagedInstance => "SQL Managed Instance",
            Self::CosmosAccount => "Cosmos DB",
            Self::MySqlServer => "MySQL Flexible Server",
            Self::PostgreSqlServer => "PostgreSQL Flexible Server",
            Self::SynapseSqlPool => "Synapse SQL Pool",
            Self::NetAppVolume => "NetApp Files",
            Self::BackupVault => "Backup Vault",
            Self::RecoveryServicesVault => "Recovery Services Vault",
            Self::Other(tag) => tag,
        }
    }

    /// Kinds that carry no capacity of their own. They always count as sized
    /// for completeness.
    pub fn is_sizeless(&self) -> bool {
        matches!(self, Self::VirtualMachine)
    }

    pub fn storage_role(&self) -> StorageRole {
        match self {
            Self::StorageAccount => StorageRole::Account,
            Self::BlobStorage
            | Self::FileShare
            | Self::TableService
            | Self::QueueService
            | Self::DataLakeStorage => StorageRole::Service,
            _ => StorageRole::Standalone,
        }
    }

    /// How the telemetry plane exposes this kind's used capacity.
    pub fn telemetry_metric(&self) -> Option<MetricSpec> {
        let (name, dimension) = match self {
            Self::StorageAccount | Self::DataLakeStorage => ("UsedCapacity", None),
            Self::BlobStorage => ("BlobCapacity", None),
            Self::FileShare => ("FileCapacity", Some("FileShare")),
            Self::TableService => ("TableCapacity", None),
            Self::QueueService => ("QueueCapacity", None),
            Self::CosmosAccount => ("DataUsage", Some("CollectionName")),
            Self::NetAppVolume => ("VolumeLogicalSize", None),
            Self::SqlDatabase => ("storage", None),
            Self::MySqlServer | Self::PostgreSqlServer => ("storage_used", None),
            _ => return None,
        };
        Some(MetricSpec { name, dimension })
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl TryFrom<String> for WorkloadKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| "workload kind must not be blank".to_string())
    }
}

impl From<WorkloadKind> for String {
    fn from(kind: WorkloadKind) -> Self {
        kind.tag().to_string()
    }
}

// ============================================================================
// Rollup Policy / Capacity Hint
// ============================================================================

/// Where a resource's capacity is attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupPolicy {
    /// Counted and sized in its own (workload, region) cell
    #[default]
    OwnBucket,
    /// Bytes roll into the parent's cell; the parent's count is untouched
    AttributeToParent,
    /// Own cell, but mutually exclusive with the parent's aggregate figure
    OwnBucketExcludedFromParentDouble,
}

impl RollupPolicy {
    /// Policy for records that did not declare one.
    pub fn infer(kind: &WorkloadKind, has_parent: bool) -> Self {
        if !has_parent {
            return Self::OwnBucket;
        }
        if kind.storage_role() == StorageRole::Service {
            Self::OwnBucketExcludedFromParentDouble
        } else {
            Self::AttributeToParent
        }
    }
}

/// How the capacity of a resource is obtained.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CapacityHint {
    /// The collector has no capacity signal for this resource
    #[default]
    Unreported,
    /// Single authoritative property (e.g. a database max-size)
    Declared {
        quantity: f64,
        #[serde(default)]
        unit: ByteUnit,
    },
    /// Only observable through telemetry; `label` is the sub-identity filter
    Telemetry {
        #[serde(default)]
        label: Option<String>,
    },
}

// ============================================================================
// Resource Record
// ============================================================================

/// One discovered cloud object, validated and immutable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRecord {
    pub workload: WorkloadKind,
    /// Opaque stable key (provider resource id)
    pub identity: String,
    pub display_name: String,
    /// Normalized location code, `Unknown` when blank
    pub region: String,
    /// Account or subscription the collector enumerated
    pub account: String,
    pub resource_group: Option<String>,
    pub parent_identity: Option<String>,
    pub rollup: RollupPolicy,
    pub capacity: CapacityHint,
    /// Free-form tags; never part of an aggregation key
    pub labels: BTreeMap<String, String>,
}

impl ResourceRecord {
    pub fn new(workload: WorkloadKind, identity: impl Into<String>, region: &str) -> Self {
        let identity = identity.into();
        Self {
            display_name: leaf_name(&identity),
            workload,
            identity,
            region: normalize_region(region),
            account: String::new(),
            resource_group: None,
            parent_identity: None,
            rollup: RollupPolicy::OwnBucket,
            capacity: CapacityHint::Unreported,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    pub fn with_resource_group(mut self, group: impl Into<String>) -> Self {
        self.resource_group = Some(group.into());
        self
    }

    /// Set the parent and infer the rollup policy from the workload kind.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_identity = Some(parent.into());
        self.rollup = RollupPolicy::infer(&self.workload, true);
        self
    }

    pub fn with_rollup(mut self, rollup: RollupPolicy) -> Self {
        self.rollup = rollup;
        self
    }

    pub fn with_declared(mut self, quantity: f64, unit: ByteUnit) -> Self {
        self.capacity = CapacityHint::Declared { quantity, unit };
        self
    }

    pub fn with_telemetry(mut self, label: Option<&str>) -> Self {
        self.capacity = CapacityHint::Telemetry {
            label: label.map(str::to_string),
        };
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(self.workload.clone(), &self.region)
    }
}

/// Resource descriptor exactly as a collector produced it.
///
/// Every field is optional so that partially populated provider payloads can
/// be deserialized; [`RawResource::validate`] decides what is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawResource {
    pub workload_kind: Option<String>,
    pub identity: Option<String>,
    pub display_name: Option<String>,
    pub region: Option<String>,
    pub resource_group: Option<String>,
    pub parent_identity: Option<String>,
    pub rollup_policy: Option<RollupPolicy>,
    pub capacity: Option<CapacityHint>,
    pub labels: BTreeMap<String, String>,
}

impl RawResource {
    /// Boundary validation: records without an identity or workload kind are
    /// rejected with a reason, everything else is normalized.
    pub fn validate(self, account: &str) -> Result<ResourceRecord, RecordSkip> {
        let identity = non_blank(self.identity);
        let Some(identity) = identity else {
            return Err(RecordSkip {
                account: account.to_string(),
                identity: None,
                reason: SkipReason::MissingIdentity,
            });
        };

        let Some(workload) = self.workload_kind.as_deref().and_then(WorkloadKind::parse) else {
            return Err(RecordSkip {
                account: account.to_string(),
                identity: Some(identity),
                reason: SkipReason::MissingWorkloadKind,
            });
        };

        let parent_identity = non_blank(self.parent_identity);
        let rollup = self
            .rollup_policy
            .unwrap_or_else(|| RollupPolicy::infer(&workload, parent_identity.is_some()));

        Ok(ResourceRecord {
            display_name: non_blank(self.display_name).unwrap_or_else(|| leaf_name(&identity)),
            region: normalize_region(self.region.as_deref().unwrap_or("")),
            account: account.to_string(),
            resource_group: non_blank(self.resource_group),
            parent_identity,
            rollup,
            capacity: self.capacity.unwrap_or_default(),
            labels: self.labels,
            workload,
            identity,
        })
    }
}

/// Why a collector record never reached the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingIdentity,
    MissingWorkloadKind,
    /// A field was present but could not be read
    Malformed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIdentity => write!(f, "missing identity"),
            Self::MissingWorkloadKind => write!(f, "missing workload kind"),
            Self::Malformed => write!(f, "malformed record"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSkip {
    pub account: String,
    pub identity: Option<String>,
    pub reason: SkipReason,
}

// ============================================================================
// Aggregation Keys and Cells
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateKey {
    pub workload: WorkloadKind,
    pub region: String,
}

impl AggregateKey {
    pub fn new(workload: WorkloadKind, region: &str) -> Self {
        Self {
            workload,
            region: normalize_region(region),
        }
    }
}

/// Read-only view of one (workload, region) cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateCell {
    #[serde(flatten)]
    pub key: AggregateKey,
    /// Resources counted in this cell
    pub count: u64,
    /// Cumulative capacity attributed to this cell
    pub bytes: u64,
}

// ============================================================================
// Protection
// ============================================================================

/// Agent family that produced a backup-protected item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionSource {
    /// Cloud-native backup of a cloud workload
    #[default]
    CloudNative,
    /// On-premises file/folder agent
    MarsAgent,
    /// On-premises Data Protection Manager
    Dpm,
    /// On-premises backup server
    BackupServer,
}

impl ProtectionSource {
    pub fn is_on_premises(&self) -> bool {
        !matches!(self, Self::CloudNative)
    }
}

/// One backup-protected item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionRecord {
    pub workload_kind: WorkloadKind,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub source_kind: ProtectionSource,
}

impl ProtectionRecord {
    pub fn new(workload_kind: WorkloadKind, region: &str, source_kind: ProtectionSource) -> Self {
        Self {
            workload_kind,
            region: normalize_region(region),
            source_kind,
        }
    }

    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(self.workload_kind.clone(), &self.region)
    }
}

// ============================================================================
// Data Quality
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    OrphanedParent,
    CollectorFailure,
    CollectorTimeout,
    ProbeErrors,
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OrphanedParent => "orphaned_parent",
            Self::CollectorFailure => "collector_failure",
            Self::CollectorTimeout => "collector_timeout",
            Self::ProbeErrors => "probe_errors",
        };
        write!(f, "{}", s)
    }
}

/// Recorded, countable data quality event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityNote {
    pub account: String,
    pub kind: NoteKind,
    pub message: String,
}

// ============================================================================
// Helpers
// ============================================================================

/// Lower-case, strip whitespace; blank becomes [`UNKNOWN_REGION`].
pub fn normalize_region(region: &str) -> String {
    let compact: String = region
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if compact.is_empty() || compact.eq_ignore_ascii_case(UNKNOWN_REGION) {
        UNKNOWN_REGION.to_string()
    } else {
        compact
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn leaf_name(identity: &str) -> String {
    identity
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(identity)
        .to_string()
}
