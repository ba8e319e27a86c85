//! Protection Correlator.
//!
//! Joins backup-protected items against the discovered (workload, region)
//! cells. `protectedSize_TiB` is a proportional estimate
//! (`cell TiB × protected / discovered`), not a measured figure: it assumes
//! protected items are of average size for their cell.

use super::types::{AggregateCell, AggregateKey, ProtectionRecord, WorkloadKind};
use super::units;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtectionRow {
    pub region: String,
    pub workload: WorkloadKind,
    pub discovered: u64,
    pub protected: u64,
    #[serde(rename = "percentProtected")]
    pub percent_protected: u32,
    /// Proportional estimate; see module docs
    #[serde(rename = "protectedSize_TiB")]
    pub protected_size_tib: f64,
    #[serde(rename = "onPremFlag")]
    pub on_prem: bool,
}

#[derive(Default)]
struct Matches {
    protected: u64,
    on_prem: bool,
}

/// Correlate a store snapshot with protection records.
///
/// Every discovered cell gets a row. Protection records whose cell was never
/// discovered (typically on-premises items) still get a row with
/// `discovered = 0`.
pub fn correlate(snapshot: &[AggregateCell], records: &[ProtectionRecord]) -> Vec<ProtectionRow> {
    let mut matches: BTreeMap<AggregateKey, Matches> = BTreeMap::new();
    for record in records {
        let entry = matches.entry(record.key()).or_default();
        entry.protected += 1;
        entry.on_prem |= record.source_kind.is_on_premises();
    }

    let mut rows = Vec::with_capacity(snapshot.len());
    for cell in snapshot {
        let found = matches.remove(&cell.key).unwrap_or_default();
        rows.push(build_row(
            cell.key.clone(),
            cell.count,
            cell.bytes,
            found.protected,
            found.on_prem,
        ));
    }
    for (key, found) in matches {
        rows.push(build_row(key, 0, 0, found.protected, found.on_prem));
    }

    rows.sort_by(|a, b| {
        a.region
            .cmp(&b.region)
            .then_with(|| a.workload.label().cmp(b.workload.label()))
    });
    rows
}

fn build_row(
    key: AggregateKey,
    discovered: u64,
    bytes: u64,
    protected: u64,
    on_prem: bool,
) -> ProtectionRow {
    let fraction = if discovered == 0 {
        0.0
    } else {
        (protected as f64 / discovered as f64).min(1.0)
    };
    ProtectionRow {
        region: key.region,
        workload: key.workload,
        discovered,
        protected,
        percent_protected: (fraction * 100.0).round() as u32,
        protected_size_tib: units::round_to(units::tib_exact(bytes) * fraction, 3),
        on_prem,
    }
}
