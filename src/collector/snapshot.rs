//! File-backed collector replaying a recorded inventory snapshot.
//!
//! ```json
//! {
//!   "accounts": [
//!     {
//!       "account": "sub-prod",
//!       "resources": [ { "workloadKind": "FileShare", "identity": "...", "capacity": { "source": "telemetry", "label": "docs" } } ],
//!       "protection": [ { "workloadKind": "VirtualMachine", "region": "eastus", "sourceKind": "cloud_native" } ],
//!       "metrics": [ { "identity": "...", "metric": "FileCapacity", "label": "docs", "aggregation": "daily_max", "value": 1024 } ],
//!       "usage": [ { "identity": "...", "bytes": 2048 } ],
//!       "failures": [ { "workload": "Cosmos DB", "message": "403 Forbidden" } ]
//!     }
//!   ]
//! }
//! ```

use super::InventoryCollector;
use crate::capacity::{
    AccountSink, CapacityProbe, MetricQuery, ProbeResult, ProtectionRecord, RawResource,
    SkipReason,
};
use crate::error::CollectorError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ============================================================================
// Snapshot Format
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub accounts: Vec<AccountSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub account: String,
    /// Kept as raw JSON so one unreadable record skips only itself
    #[serde(default)]
    pub resources: Vec<serde_json::Value>,
    #[serde(default)]
    pub protection: Vec<serde_json::Value>,
    #[serde(default)]
    pub metrics: Vec<MetricSample>,
    #[serde(default)]
    pub usage: Vec<UsageSample>,
    /// Enumeration calls that failed when the snapshot was recorded
    #[serde(default)]
    pub failures: Vec<FailedCall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricAggregation {
    DailyMax,
    HourlyAverage,
}

/// One recorded telemetry answer, in bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub identity: String,
    pub metric: String,
    /// Dimension value the sample was filtered by; absent means unfiltered
    #[serde(default)]
    pub label: Option<String>,
    pub aggregation: MetricAggregation,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSample {
    pub identity: String,
    pub bytes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedCall {
    pub workload: String,
    pub message: String,
}

/// Load and parse a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<InventorySnapshot, CollectorError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CollectorError::Snapshot(format!("failed to read {}: {}", path.display(), e))
    })?;
    parse_snapshot(&content)
        .map_err(|e| CollectorError::Snapshot(format!("{}: {}", path.display(), e)))
}

pub fn parse_snapshot(content: &str) -> Result<InventorySnapshot, serde_json::Error> {
    serde_json::from_str(content)
}

// ============================================================================
// Probe
// ============================================================================

type SampleKey = (String, String, Option<String>, MetricAggregation);

/// Answers the resolution chain from recorded samples.
///
/// Label matching is exact, so a sample recorded under `docs` does not answer
/// a query for `Docs`; the chain's lower-cased retry covers that case.
#[derive(Debug, Clone, Default)]
pub struct SnapshotProbe {
    samples: HashMap<SampleKey, f64>,
    usage: HashMap<String, f64>,
}

impl SnapshotProbe {
    pub fn new(metrics: &[MetricSample], usage: &[UsageSample]) -> Self {
        let mut probe = Self::default();
        for sample in metrics {
            probe.samples.insert(
                (
                    sample.identity.clone(),
                    sample.metric.clone(),
                    sample.label.clone(),
                    sample.aggregation,
                ),
                sample.value,
            );
        }
        for sample in usage {
            probe.usage.insert(sample.identity.clone(), sample.bytes);
        }
        probe
    }

    fn lookup(&self, query: &MetricQuery<'_>, aggregation: MetricAggregation) -> ProbeResult {
        let key = (
            query.identity.to_string(),
            query.metric.to_string(),
            query.label.map(str::to_string),
            aggregation,
        );
        Ok(self.samples.get(&key).copied())
    }
}

impl CapacityProbe for SnapshotProbe {
    fn daily_maximum(&self, query: &MetricQuery<'_>) -> ProbeResult {
        self.lookup(query, MetricAggregation::DailyMax)
    }

    fn hourly_average(&self, query: &MetricQuery<'_>) -> ProbeResult {
        self.lookup(query, MetricAggregation::HourlyAverage)
    }

    fn measure_usage(&self, identity: &str) -> ProbeResult {
        Ok(self.usage.get(identity).copied())
    }
}

// ============================================================================
// Collector
// ============================================================================

/// Replays one account of a snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotCollector {
    snapshot: AccountSnapshot,
    probe: SnapshotProbe,
}

impl SnapshotCollector {
    pub fn new(snapshot: AccountSnapshot) -> Self {
        let probe = SnapshotProbe::new(&snapshot.metrics, &snapshot.usage);
        Self { snapshot, probe }
    }

    /// One collector per account in the snapshot.
    pub fn from_snapshot(snapshot: InventorySnapshot) -> Vec<Self> {
        snapshot.accounts.into_iter().map(Self::new).collect()
    }
}

impl InventoryCollector for SnapshotCollector {
    fn account(&self) -> &str {
        &self.snapshot.account
    }

    async fn collect(&self, sink: &AccountSink<'_>) -> Result<(), CollectorError> {
        let mut skipped = 0usize;
        for value in &self.snapshot.resources {
            let accepted = match RawResource::deserialize(value) {
                Ok(raw) => sink.resource(raw, &self.probe),
                Err(e) => {
                    log::warn!("Unreadable resource in account {}: {}", sink.account(), e);
                    sink.skip(identity_of(value), SkipReason::Malformed);
                    false
                }
            };
            if !accepted {
                skipped += 1;
            }
        }
        for value in &self.snapshot.protection {
            match ProtectionRecord::deserialize(value) {
                Ok(record) => sink.protection(record),
                Err(e) => {
                    log::warn!("Unreadable protected item in account {}: {}", sink.account(), e);
                    sink.skip(None, SkipReason::Malformed);
                    skipped += 1;
                }
            }
        }
        for failed in &self.snapshot.failures {
            sink.failure(&CollectorError::Enumeration {
                workload: failed.workload.clone(),
                message: failed.message.clone(),
            });
        }
        log::debug!(
            "Replayed account {}: {} resources, {} protected items ({} skipped)",
            self.snapshot.account,
            self.snapshot.resources.len(),
            self.snapshot.protection.len(),
            skipped
        );
        Ok(())
    }
}

fn identity_of(value: &serde_json::Value) -> Option<String> {
    value
        .get("identity")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{CensusEngine, EngineSettings, WorkloadKind};

    const SNAPSHOT: &str = r#"{
        "accounts": [{
            "account": "sub-1",
            "resources": [
                {
                    "workloadKind": "FileShare",
                    "identity": "/sa/acct/shares/Docs",
                    "parentIdentity": "/sa/acct",
                    "region": "East US",
                    "capacity": { "source": "telemetry", "label": "Docs" }
                },
                { "identity": "/no/kind" }
            ],
            "metrics": [
                { "identity": "/sa/acct/shares/Docs", "metric": "FileCapacity", "label": "docs", "aggregation": "daily_max", "value": 2048 }
            ],
            "failures": [ { "workload": "Cosmos DB", "message": "403" } ]
        }]
    }"#;

    #[test]
    fn test_parse_snapshot_defaults() {
        let snapshot = parse_snapshot(r#"{ "accounts": [ { "account": "a" } ] }"#).unwrap();
        assert_eq!(snapshot.accounts.len(), 1);
        assert!(snapshot.accounts[0].resources.is_empty());
        assert!(parse_snapshot("{}").unwrap().accounts.is_empty());
    }

    #[test]
    fn test_probe_label_match_is_exact() {
        let probe = SnapshotProbe::new(
            &[MetricSample {
                identity: "/share".into(),
                metric: "FileCapacity".into(),
                label: Some("docs".into()),
                aggregation: MetricAggregation::DailyMax,
                value: 10.0,
            }],
            &[],
        );
        let mut query = MetricQuery {
            identity: "/share",
            metric: "FileCapacity",
            dimension: Some("FileShare"),
            label: Some("Docs"),
        };
        assert_eq!(probe.daily_maximum(&query).unwrap(), None);
        query.label = Some("docs");
        assert_eq!(probe.daily_maximum(&query).unwrap(), Some(10.0));
        assert_eq!(probe.hourly_average(&query).unwrap(), None);
    }

    #[tokio::test]
    async fn test_snapshot_collector_replays_account() {
        let snapshot = parse_snapshot(SNAPSHOT).unwrap();
        let collectors = SnapshotCollector::from_snapshot(snapshot);
        let engine = CensusEngine::new(EngineSettings::default());
        let sink = engine.sink(collectors[0].account());
        collectors[0].collect(&sink).await.unwrap();

        let report = engine.finish();
        assert_eq!(report.skipped.len(), 1);
        let files = report.region_row(&WorkloadKind::FileShare, "eastus").unwrap();
        assert_eq!(files.bytes, 2048);
        assert_eq!(report.data_quality.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_records_skip_individually() {
        let snapshot = parse_snapshot(
            r#"{ "accounts": [{
                "account": "sub-1",
                "resources": [
                    { "workloadKind": "VirtualMachine", "identity": "/vm/good", "region": "eastus" },
                    { "workloadKind": "VirtualMachine", "identity": "/vm/odd", "rollupPolicy": "weird" },
                    { "workloadKind": "ManagedDisk", "identity": "/disk/x", "capacity": { "source": "declared" } }
                ],
                "protection": [
                    { "workloadKind": "VirtualMachine", "region": "eastus" },
                    { "workloadKind": "VirtualMachine", "sourceKind": "tape_robot" },
                    { "workloadKind": "", "region": "eastus" }
                ]
            }] }"#,
        )
        .unwrap();
        let collectors = SnapshotCollector::from_snapshot(snapshot);
        let engine = CensusEngine::new(EngineSettings::default());
        let sink = engine.sink(collectors[0].account());
        collectors[0].collect(&sink).await.unwrap();

        let report = engine.finish();
        assert_eq!(report.total_count(), 1);
        assert_eq!(report.skipped.len(), 4);
        assert!(report.skipped.iter().all(|s| s.reason == SkipReason::Malformed));
        assert!(report.skipped.iter().any(|s| s.identity.as_deref() == Some("/vm/odd")));
        let row = report.protection_for(&WorkloadKind::VirtualMachine, "eastus").unwrap();
        assert_eq!(row.protected, 1);
        assert!(report.protection.iter().all(|r| !r.workload.label().is_empty()));
    }

    #[test]
    fn test_load_snapshot_missing_file() {
        let err = load_snapshot(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, CollectorError::Snapshot(_)));
    }
}
