//! Report tables produced at the end of a run.
//!
//! All tables are provider-agnostic and sorted deterministically so that the
//! same input renders the same output regardless of collection order.

use super::config::StorageAggregationMode;
use super::protection::ProtectionRow;
use super::pseudonym::AnonymizeScope;
use super::resolver::ResolutionStep;
use super::store::{CompletenessRow, WorkloadTotal};
use super::types::{AggregateCell, DataQualityNote, RecordSkip, WorkloadKind};
use super::units;
use serde::Serialize;

/// Totals-by-region-and-workload row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionWorkloadRow {
    pub region: String,
    pub workload: WorkloadKind,
    pub count: u64,
    pub bytes: u64,
    #[serde(rename = "size_GiB")]
    pub size_gib: f64,
    #[serde(rename = "size_TiB")]
    pub size_tib: f64,
}

impl From<&AggregateCell> for RegionWorkloadRow {
    fn from(cell: &AggregateCell) -> Self {
        Self {
            region: cell.key.region.clone(),
            workload: cell.key.workload.clone(),
            count: cell.count,
            bytes: cell.bytes,
            size_gib: units::to_gib(cell.bytes),
            size_tib: units::to_tib(cell.bytes),
        }
    }
}

/// Inventory line for one resource, anonymized per the run's scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDetail {
    pub account: String,
    pub resource_group: Option<String>,
    pub resource: String,
    pub workload: WorkloadKind,
    pub region: String,
    #[serde(rename = "resolved_GiB")]
    pub resolved_gib: f64,
    /// What this resource added to the aggregate; 0 for detail-only lines
    #[serde(rename = "contributed_GiB")]
    pub contributed_gib: f64,
    pub step: ResolutionStep,
    /// Cell label (`workload@region`) that received the bytes, if not its own
    pub attributed_to: Option<String>,
    pub labels: std::collections::BTreeMap<String, String>,
}

/// Run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    pub run_id: String,
    pub timestamp: String,
    pub version: String,
    pub storage_mode: StorageAggregationMode,
    pub anonymize_scope: AnonymizeScope,
    /// Present only when no salt was supplied and one was generated
    pub generated_salt: Option<String>,
    pub accounts: usize,
    pub resources: usize,
    pub duration_ms: u64,
}

/// Everything the report writers render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityReport {
    pub metadata: ReportMetadata,
    pub totals: Vec<WorkloadTotal>,
    pub by_region: Vec<RegionWorkloadRow>,
    pub completeness: Vec<CompletenessRow>,
    pub protection: Vec<ProtectionRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ResourceDetail>,
    pub skipped: Vec<RecordSkip>,
    pub data_quality: Vec<DataQualityNote>,
}

impl CapacityReport {
    /// Total bytes over all cells.
    pub fn total_bytes(&self) -> u64 {
        self.by_region.iter().map(|r| r.bytes).fold(0, u64::saturating_add)
    }

    pub fn total_count(&self) -> u64 {
        self.totals.iter().map(|t| t.count).fold(0, u64::saturating_add)
    }

    pub fn region_row(&self, workload: &WorkloadKind, region: &str) -> Option<&RegionWorkloadRow> {
        self.by_region
            .iter()
            .find(|r| &r.workload == workload && r.region == region)
    }

    pub fn total_for(&self, workload: &WorkloadKind) -> Option<&WorkloadTotal> {
        self.totals.iter().find(|t| &t.workload == workload)
    }

    pub fn completeness_for(&self, workload: &WorkloadKind) -> Option<&CompletenessRow> {
        self.completeness.iter().find(|c| &c.workload == workload)
    }

    pub fn protection_for(&self, workload: &WorkloadKind, region: &str) -> Option<&ProtectionRow> {
        self.protection
            .iter()
            .find(|p| &p.workload == workload && p.region == region)
    }

    pub fn has_data_quality_issues(&self) -> bool {
        !self.skipped.is_empty() || !self.data_quality.is_empty()
    }
}
