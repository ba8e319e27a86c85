//! Metric Resolution Chain.
//!
//! Resolves the capacity of one resource. Kinds with a single authoritative
//! property are a direct read. Kinds only observable through telemetry walk
//! an ordered chain and stop at the first strictly positive value:
//!
//! ```text
//!   1. daily maximum, filtered by the exact sub-identity label
//!   2. daily maximum, filtered by the lower-cased label
//!   3. hourly average, no label filter
//!   4. direct usage probe against the resource (slow, last resort)
//! ```
//!
//! Exhausting the chain resolves to exactly 0 bytes. That is a valid,
//! reportable state and shows up in completeness, not as an error.
//!
//! The network calls behind each step belong to the collector and are
//! injected through [`CapacityProbe`].

use super::types::{CapacityHint, MetricSpec, ResourceRecord};
use super::units::{self, ByteUnit};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error type for a single probe call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("Telemetry not available for this resource")]
    Unavailable,

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Probe failed: {0}")]
    Failed(String),
}

/// Probe result: `Ok(None)` means the source had no data points.
pub type ProbeResult = Result<Option<f64>, ProbeError>;

/// One telemetry query issued by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricQuery<'a> {
    /// Resource (or sub-service) identity the metric is scoped to
    pub identity: &'a str,
    pub metric: &'a str,
    /// Dimension to filter on, if the metric has one
    pub dimension: Option<&'a str>,
    /// Dimension value to filter by; `None` means no filter
    pub label: Option<&'a str>,
}

/// Capacity-resolution callback supplied by a collector.
///
/// Values are in bytes. Implementations perform or replay the actual calls;
/// the chain only decides which to try and in what order.
pub trait CapacityProbe: Send + Sync {
    /// Daily maximum aggregation over the retention window.
    fn daily_maximum(&self, query: &MetricQuery<'_>) -> ProbeResult;

    /// Hourly average aggregation over the retention window.
    fn hourly_average(&self, query: &MetricQuery<'_>) -> ProbeResult;

    /// Synchronous "get usage" call against the resource itself.
    fn measure_usage(&self, identity: &str) -> ProbeResult;
}

/// Probe for collectors with no telemetry access at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTelemetry;

impl CapacityProbe for NoTelemetry {
    fn daily_maximum(&self, _query: &MetricQuery<'_>) -> ProbeResult {
        Err(ProbeError::Unavailable)
    }

    fn hourly_average(&self, _query: &MetricQuery<'_>) -> ProbeResult {
        Err(ProbeError::Unavailable)
    }

    fn measure_usage(&self, _identity: &str) -> ProbeResult {
        Err(ProbeError::Unavailable)
    }
}

/// Which source produced the resolved figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStep {
    /// Authoritative property read directly
    Declared,
    FilteredDailyMax,
    NormalizedDailyMax,
    HourlyAverage,
    DirectMeasurement,
    /// Every step came back empty; capacity is 0
    Unresolved,
    /// No capacity signal exists for this resource
    NotReported,
}

impl ResolutionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Declared => "declared",
            Self::FilteredDailyMax => "filtered_daily_max",
            Self::NormalizedDailyMax => "normalized_daily_max",
            Self::HourlyAverage => "hourly_average",
            Self::DirectMeasurement => "direct_measurement",
            Self::Unresolved => "unresolved",
            Self::NotReported => "not_reported",
        }
    }
}

impl fmt::Display for ResolutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of resolving one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub bytes: u64,
    pub step: ResolutionStep,
    /// Probe calls that errored (as opposed to returning no data)
    pub probe_errors: u32,
}

impl Resolution {
    fn new(bytes: u64, step: ResolutionStep, probe_errors: u32) -> Self {
        Self {
            bytes,
            step,
            probe_errors,
        }
    }

    pub fn is_sized(&self) -> bool {
        self.bytes > 0
    }
}

/// Resolve the capacity of `record` in bytes.
pub fn resolve_capacity(record: &ResourceRecord, probe: &dyn CapacityProbe) -> Resolution {
    match &record.capacity {
        CapacityHint::Unreported => Resolution::new(0, ResolutionStep::NotReported, 0),
        CapacityHint::Declared { quantity, unit } => {
            let bytes = units::to_bytes(*quantity, *unit);
            let step = if bytes > 0 {
                ResolutionStep::Declared
            } else {
                ResolutionStep::Unresolved
            };
            Resolution::new(bytes, step, 0)
        }
        CapacityHint::Telemetry { label } => {
            let spec = record.workload.telemetry_metric();
            resolve_chain(&record.identity, spec, label.as_deref(), probe)
        }
    }
}

fn resolve_chain(
    identity: &str,
    spec: Option<MetricSpec>,
    label: Option<&str>,
    probe: &dyn CapacityProbe,
) -> Resolution {
    let mut errors = 0u32;

    if let Some(spec) = spec {
        let base = MetricQuery {
            identity,
            metric: spec.name,
            dimension: spec.dimension,
            label: None,
        };

        if let Some(label) = label.filter(|l| !l.is_empty()) {
            let exact = MetricQuery {
                label: Some(label),
                ..base
            };
            if let Some(bytes) = positive(probe.daily_maximum(&exact), &mut errors) {
                return Resolution::new(bytes, ResolutionStep::FilteredDailyMax, errors);
            }

            let lowered = label.to_lowercase();
            if lowered != label {
                let normalized = MetricQuery {
                    label: Some(&lowered),
                    ..base
                };
                if let Some(bytes) = positive(probe.daily_maximum(&normalized), &mut errors) {
                    return Resolution::new(bytes, ResolutionStep::NormalizedDailyMax, errors);
                }
            }
        }

        if let Some(bytes) = positive(probe.hourly_average(&base), &mut errors) {
            return Resolution::new(bytes, ResolutionStep::HourlyAverage, errors);
        }
    }

    if let Some(bytes) = positive(probe.measure_usage(identity), &mut errors) {
        return Resolution::new(bytes, ResolutionStep::DirectMeasurement, errors);
    }

    log::debug!(
        "Capacity chain exhausted for a {} resource ({} probe errors)",
        spec.map(|s| s.name).unwrap_or("untyped"),
        errors
    );
    Resolution::new(0, ResolutionStep::Unresolved, errors)
}

/// Positive byte count from a probe result, counting errors.
fn positive(result: ProbeResult, errors: &mut u32) -> Option<u64> {
    match result {
        Ok(Some(value)) => {
            let bytes = units::to_bytes(value, ByteUnit::Bytes);
            (bytes > 0).then_some(bytes)
        }
        Ok(None) => None,
        Err(ProbeError::Unavailable) => None,
        Err(e) => {
            log::debug!("Capacity probe error: {}", e);
            *errors += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::types::WorkloadKind;
    use parking_lot::Mutex;

    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    /// Scripted probe recording every call it receives.
    #[derive(Default)]
    struct ScriptedProbe {
        daily: Vec<(Option<String>, ProbeResult)>,
        hourly: Option<ProbeResult>,
        usage: Option<ProbeResult>,
        calls: Mutex<Vec<String>>,
    }

    impl CapacityProbe for ScriptedProbe {
        fn daily_maximum(&self, query: &MetricQuery<'_>) -> ProbeResult {
            self.calls
                .lock()
                .push(format!("daily:{}", query.label.unwrap_or("-")));
            self.daily
                .iter()
                .find(|(label, _)| label.as_deref() == query.label)
                .map(|(_, r)| r.clone())
                .unwrap_or(Ok(None))
        }

        fn hourly_average(&self, _query: &MetricQuery<'_>) -> ProbeResult {
            self.calls.lock().push("hourly".to_string());
            self.hourly.clone().unwrap_or(Ok(None))
        }

        fn measure_usage(&self, _identity: &str) -> ProbeResult {
            self.calls.lock().push("usage".to_string());
            self.usage.clone().unwrap_or(Ok(None))
        }
    }

    fn share(label: &str) -> ResourceRecord {
        ResourceRecord::new(WorkloadKind::FileShare, "/sa/acct/shares/x", "eastus")
            .with_telemetry(Some(label))
    }

    #[test]
    fn test_declared_is_direct_read() {
        let record = ResourceRecord::new(WorkloadKind::SqlDatabase, "/sql/db1", "eastus")
            .with_declared(32.0, ByteUnit::Gibibytes);
        let res = resolve_capacity(&record, &NoTelemetry);
        assert_eq!(res.step, ResolutionStep::Declared);
        assert_eq!(res.bytes, 32 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_exact_label_wins_first() {
        let probe = ScriptedProbe {
            daily: vec![(Some("Docs".into()), Ok(Some(100.0 * GIB)))],
            hourly: Some(Ok(Some(7.0))),
            ..Default::default()
        };
        let res = resolve_capacity(&share("Docs"), &probe);
        assert_eq!(res.step, ResolutionStep::FilteredDailyMax);
        assert_eq!(res.bytes, (100.0 * GIB) as u64);
        assert_eq!(probe.calls.lock().as_slice(), ["daily:Docs"]);
    }

    #[test]
    fn test_lowercase_label_fallback() {
        let probe = ScriptedProbe {
            daily: vec![(Some("docs".into()), Ok(Some(5.0 * GIB)))],
            ..Default::default()
        };
        let res = resolve_capacity(&share("Docs"), &probe);
        assert_eq!(res.step, ResolutionStep::NormalizedDailyMax);
        assert_eq!(probe.calls.lock().as_slice(), ["daily:Docs", "daily:docs"]);
    }

    #[test]
    fn test_lowercase_step_skipped_when_identical() {
        let probe = ScriptedProbe {
            hourly: Some(Ok(Some(3.0 * GIB))),
            ..Default::default()
        };
        let res = resolve_capacity(&share("docs"), &probe);
        assert_eq!(res.step, ResolutionStep::HourlyAverage);
        assert_eq!(probe.calls.lock().as_slice(), ["daily:docs", "hourly"]);
    }

    #[test]
    fn test_direct_measurement_last_resort() {
        let probe = ScriptedProbe {
            daily: vec![(Some("Docs".into()), Ok(Some(0.0)))],
            hourly: Some(Err(ProbeError::Throttled("429".into()))),
            usage: Some(Ok(Some(2048.0))),
            ..Default::default()
        };
        let res = resolve_capacity(&share("Docs"), &probe);
        assert_eq!(res.step, ResolutionStep::DirectMeasurement);
        assert_eq!(res.bytes, 2048);
        assert_eq!(res.probe_errors, 1);
    }

    #[test]
    fn test_exhausted_chain_is_zero() {
        let res = resolve_capacity(&share("Docs"), &NoTelemetry);
        assert_eq!(res.step, ResolutionStep::Unresolved);
        assert_eq!(res.bytes, 0);
        assert_eq!(res.probe_errors, 0);
        assert!(!res.is_sized());
    }

    #[test]
    fn test_kind_without_metric_goes_straight_to_probe() {
        let record = ResourceRecord::new(WorkloadKind::BackupVault, "/vaults/v1", "eastus")
            .with_telemetry(None);
        let probe = ScriptedProbe {
            usage: Some(Ok(Some(10.0))),
            ..Default::default()
        };
        let res = resolve_capacity(&record, &probe);
        assert_eq!(res.step, ResolutionStep::DirectMeasurement);
        assert_eq!(probe.calls.lock().as_slice(), ["usage"]);
    }

    #[test]
    fn test_unreported_never_probes() {
        let record = ResourceRecord::new(WorkloadKind::VirtualMachine, "/vm/a", "eastus");
        let probe = ScriptedProbe::default();
        let res = resolve_capacity(&record, &probe);
        assert_eq!(res.step, ResolutionStep::NotReported);
        assert!(probe.calls.lock().is_empty());
    }
}
