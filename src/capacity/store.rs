//! Aggregation Store.
//!
//! Multi-dimensional accumulator keyed by (workload, region). Each mutation
//! runs under the owning shard's lock, so concurrent collectors and rayon
//! workers can call [`AggregationStore::accumulate`] freely. Accumulation is
//! pure addition per key, so the final contents do not depend on call order.

use super::router::Attribution;
use super::types::{AggregateCell, AggregateKey, WorkloadKind};
use super::units;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counters {
    count: u64,
    bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Completeness {
    discovered: u64,
    with_size: u64,
}

/// One row per workload kind with all regions folded together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadTotal {
    pub workload: WorkloadKind,
    pub count: u64,
    pub bytes: u64,
    #[serde(rename = "size_GiB")]
    pub size_gib: f64,
    #[serde(rename = "size_TiB")]
    pub size_tib: f64,
}

/// Discovered vs. sized resources for one workload kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessRow {
    pub workload: WorkloadKind,
    pub discovered: u64,
    #[serde(rename = "withSize")]
    pub with_size: u64,
    #[serde(rename = "completenessPercent")]
    pub completeness_percent: f64,
}

#[derive(Debug, Default)]
pub struct AggregationStore {
    cells: DashMap<AggregateKey, Counters>,
    completeness: DashMap<WorkloadKind, Completeness>,
}

impl AggregationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add deltas to a cell, creating it on first write. A zero/zero delta is
    /// a no-op and never creates a cell.
    pub fn accumulate(&self, key: AggregateKey, count_delta: u64, byte_delta: u64) {
        if count_delta == 0 && byte_delta == 0 {
            return;
        }
        let mut cell = self.cells.entry(key).or_default();
        cell.count = cell.count.saturating_add(count_delta);
        cell.bytes = cell.bytes.saturating_add(byte_delta);
    }

    pub fn apply(&self, attribution: &Attribution) {
        self.accumulate(
            attribution.key.clone(),
            attribution.count_delta,
            attribution.byte_delta,
        );
    }

    /// Record one routed resource for completeness. Sizeless kinds always
    /// count as sized.
    pub fn track(&self, workload: &WorkloadKind, sized: bool) {
        let mut entry = self.completeness.entry(workload.clone()).or_default();
        entry.discovered += 1;
        if sized || workload.is_sizeless() {
            entry.with_size += 1;
        }
    }

    /// Read-only export, sorted by region then workload label.
    pub fn snapshot(&self) -> Vec<AggregateCell> {
        let mut cells: Vec<AggregateCell> = self
            .cells
            .iter()
            .map(|entry| AggregateCell {
                key: entry.key().clone(),
                count: entry.count,
                bytes: entry.bytes,
            })
            .collect();
        cells.sort_by(|a, b| {
            a.key
                .region
                .cmp(&b.key.region)
                .then_with(|| a.key.workload.label().cmp(b.key.workload.label()))
        });
        cells
    }

    pub fn get(&self, key: &AggregateKey) -> Option<AggregateCell> {
        self.cells.get(key).map(|c| AggregateCell {
            key: key.clone(),
            count: c.count,
            bytes: c.bytes,
        })
    }

    /// Fold all regions into one row per workload, sorted by workload name.
    pub fn totals_by_workload(&self) -> Vec<WorkloadTotal> {
        let mut folded: BTreeMap<String, (WorkloadKind, Counters)> = BTreeMap::new();
        for entry in self.cells.iter() {
            let workload = &entry.key().workload;
            let slot = folded
                .entry(workload.label().to_string())
                .or_insert_with(|| (workload.clone(), Counters::default()));
            slot.1.count = slot.1.count.saturating_add(entry.count);
            slot.1.bytes = slot.1.bytes.saturating_add(entry.bytes);
        }
        folded
            .into_values()
            .map(|(workload, c)| WorkloadTotal {
                workload,
                count: c.count,
                bytes: c.bytes,
                size_gib: units::to_gib(c.bytes),
                size_tib: units::to_tib(c.bytes),
            })
            .collect()
    }

    /// Completeness per workload, sorted by workload name.
    pub fn completeness(&self) -> Vec<CompletenessRow> {
        let mut rows: Vec<CompletenessRow> = self
            .completeness
            .iter()
            .map(|entry| CompletenessRow {
                workload: entry.key().clone(),
                discovered: entry.discovered,
                with_size: entry.with_size,
                completeness_percent: completeness_percent(entry.with_size, entry.discovered),
            })
            .collect();
        rows.sort_by(|a, b| a.workload.label().cmp(b.workload.label()));
        rows
    }

    /// Sum of bytes across every cell.
    pub fn total_bytes(&self) -> u64 {
        self.cells.iter().map(|c| c.bytes).fold(0, u64::saturating_add)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.completeness.is_empty()
    }
}

/// `with_size / discovered` as a percentage; nothing discovered is 100%.
pub fn completeness_percent(with_size: u64, discovered: u64) -> f64 {
    if discovered == 0 {
        return 100.0;
    }
    units::round_to(with_size as f64 / discovered as f64 * 100.0, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    fn key(kind: WorkloadKind, region: &str) -> AggregateKey {
        AggregateKey::new(kind, region)
    }

    #[test]
    fn test_accumulate_creates_and_adds() {
        let store = AggregationStore::new();
        store.accumulate(key(WorkloadKind::VirtualMachine, "eastus"), 1, 0);
        store.accumulate(key(WorkloadKind::VirtualMachine, "eastus"), 0, 300);
        store.accumulate(key(WorkloadKind::VirtualMachine, "eastus"), 1, 200);

        let cell = store.get(&key(WorkloadKind::VirtualMachine, "eastus")).unwrap();
        assert_eq!(cell.count, 2);
        assert_eq!(cell.bytes, 500);
    }

    #[test]
    fn test_zero_delta_is_noop() {
        let store = AggregationStore::new();
        for _ in 0..10 {
            store.accumulate(key(WorkloadKind::FileShare, "eastus"), 0, 0);
        }
        assert!(store.snapshot().is_empty());

        store.accumulate(key(WorkloadKind::FileShare, "eastus"), 1, 5);
        let before = store.snapshot();
        store.accumulate(key(WorkloadKind::FileShare, "eastus"), 0, 0);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_concurrent_accumulate() {
        let store = AggregationStore::new();
        (0..1000u64).into_par_iter().for_each(|i| {
            let region = if i % 2 == 0 { "eastus" } else { "westus" };
            store.accumulate(key(WorkloadKind::BlobStorage, region), 1, 10);
        });
        assert_eq!(store.total_bytes(), 10_000);
        let totals = store.totals_by_workload();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].count, 1000);
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let store = AggregationStore::new();
        store.accumulate(key(WorkloadKind::NetAppVolume, "eastus"), 1, u64::MAX);
        store.accumulate(key(WorkloadKind::NetAppVolume, "westus"), 1, 1 << 30);

        let totals = store.totals_by_workload();
        assert_eq!(totals[0].count, 2);
        assert_eq!(totals[0].bytes, u64::MAX);
        assert_eq!(store.total_bytes(), u64::MAX);
    }

    #[test]
    fn test_totals_sorted_by_workload_name() {
        let store = AggregationStore::new();
        store.accumulate(key(WorkloadKind::TableService, "eastus"), 1, 1);
        store.accumulate(key(WorkloadKind::VirtualMachine, "westus"), 1, 1);
        store.accumulate(key(WorkloadKind::FileShare, "eastus"), 1, 1);
        store.accumulate(key(WorkloadKind::FileShare, "westus"), 2, 1);

        let totals = store.totals_by_workload();
        let names: Vec<&str> = totals.iter().map(|t| t.workload.label()).collect();
        assert_eq!(names, ["Azure Files", "Azure VM", "Table Storage"]);
        assert_eq!(totals[0].count, 3);
        assert_eq!(totals[0].bytes, 2);
    }

    #[test]
    fn test_completeness_tracking() {
        let store = AggregationStore::new();
        store.track(&WorkloadKind::FileShare, true);
        store.track(&WorkloadKind::FileShare, false);
        store.track(&WorkloadKind::VirtualMachine, false);

        let rows = store.completeness();
        let files = rows.iter().find(|r| r.workload == WorkloadKind::FileShare).unwrap();
        assert_eq!(files.discovered, 2);
        assert_eq!(files.with_size, 1);
        assert_eq!(files.completeness_percent, 50.0);

        let vms = rows.iter().find(|r| r.workload == WorkloadKind::VirtualMachine).unwrap();
        assert_eq!(vms.completeness_percent, 100.0);
    }

    #[test]
    fn test_completeness_percent_empty() {
        assert_eq!(completeness_percent(0, 0), 100.0);
        assert_eq!(completeness_percent(1, 3), 33.3);
    }
}
