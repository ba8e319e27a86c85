//! Census engine: staging, routing and report assembly for one run.
//!
//! ```text
//!  collectors ──► AccountSink ──► validate ──► resolve capacity ──► staged
//!                                                                    │
//!                                             finish(): ParentIndex ◄┘
//!                                                         │
//!                                   route (rayon) ──► AggregationStore
//!                                                         │
//!                         correlate protection ──► CapacityReport
//! ```
//!
//! Routing waits until collection has ended so that "was the parent seen in
//! this run" does not depend on the order collectors delivered records in.
//! Anything already staged when a collector fails or times out stays valid.

use super::config::EngineSettings;
use super::protection;
use super::pseudonym::{PseudonymScope, Pseudonymizer};
use super::report::{CapacityReport, RegionWorkloadRow, ReportMetadata, ResourceDetail};
use super::resolver::{CapacityProbe, Resolution, resolve_capacity};
use super::router::{AttributionRouter, ParentIndex, Routing};
use super::store::AggregationStore;
use super::types::{
    DataQualityNote, NoteKind, ProtectionRecord, RawResource, RecordSkip, ResourceRecord,
    SkipReason, normalize_region,
};
use super::units;
use crate::error::CollectorError;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

struct StagedResource {
    record: ResourceRecord,
    resolution: Resolution,
}

/// One aggregation run. Shareable across collector tasks by reference.
pub struct CensusEngine {
    settings: EngineSettings,
    pseudonymizer: Pseudonymizer,
    staged: Mutex<Vec<StagedResource>>,
    protection: Mutex<Vec<ProtectionRecord>>,
    skipped: Mutex<Vec<RecordSkip>>,
    notes: Mutex<Vec<DataQualityNote>>,
    accounts: Mutex<BTreeSet<String>>,
    started: Instant,
}

impl CensusEngine {
    pub fn new(settings: EngineSettings) -> Self {
        let pseudonymizer =
            Pseudonymizer::new(settings.anonymize_scope, settings.anonymize_salt.as_deref());
        if let Some(salt) = pseudonymizer.generated_salt() {
            log::warn!(
                "No anonymization salt supplied; generated salt '{}' for this run. \
                 Pass it with --salt to reproduce the same pseudonyms.",
                salt
            );
        }
        Self {
            settings,
            pseudonymizer,
            staged: Mutex::new(Vec::new()),
            protection: Mutex::new(Vec::new()),
            skipped: Mutex::new(Vec::new()),
            notes: Mutex::new(Vec::new()),
            accounts: Mutex::new(BTreeSet::new()),
            started: Instant::now(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn pseudonymizer(&self) -> &Pseudonymizer {
        &self.pseudonymizer
    }

    /// Handle a collector uses to deliver one account's results.
    pub fn sink(&self, account: &str) -> AccountSink<'_> {
        self.accounts.lock().insert(account.to_string());
        AccountSink {
            engine: self,
            account: account.to_string(),
        }
    }

    /// Validate, resolve and stage a raw collector record. Returns `false` if
    /// the record was skipped at the boundary.
    pub fn submit(&self, account: &str, raw: RawResource, probe: &dyn CapacityProbe) -> bool {
        match raw.validate(account) {
            Ok(record) => {
                self.submit_record(record, probe);
                true
            }
            Err(skip) => {
                self.record_skip(skip);
                false
            }
        }
    }

    /// Record a collector record that never reached the router.
    pub fn record_skip(&self, skip: RecordSkip) {
        log::warn!("Skipping record from account {}: {}", skip.account, skip.reason);
        self.skipped.lock().push(skip);
    }

    /// Resolve and stage an already validated record.
    pub fn submit_record(&self, record: ResourceRecord, probe: &dyn CapacityProbe) {
        let resolution = resolve_capacity(&record, probe);
        self.staged.lock().push(StagedResource { record, resolution });
    }

    pub fn submit_protection(&self, mut record: ProtectionRecord) {
        record.region = normalize_region(&record.region);
        self.protection.lock().push(record);
    }

    /// Record a collector failure as a data quality note.
    pub fn record_failure(&self, account: &str, error: &CollectorError) {
        let kind = match error {
            CollectorError::Timeout { .. } => NoteKind::CollectorTimeout,
            _ => NoteKind::CollectorFailure,
        };
        log::warn!("Collector failure for account {}: {}", account, error);
        self.notes.lock().push(DataQualityNote {
            account: account.to_string(),
            kind,
            message: error.to_string(),
        });
    }

    /// Number of records staged so far.
    pub fn staged_len(&self) -> usize {
        self.staged.lock().len()
    }

    /// End the collection phase: route everything, accumulate and assemble.
    pub fn finish(self) -> CapacityReport {
        let staged = self.staged.into_inner();
        let protection_records = self.protection.into_inner();
        let mut skipped = self.skipped.into_inner();
        let mut notes = self.notes.into_inner();
        let accounts = self.accounts.into_inner();

        let index = ParentIndex::build(staged.iter().map(|s| &s.record));
        let router = AttributionRouter::new(self.settings.storage_mode, &index);
        let store = AggregationStore::new();

        let routings: Vec<Routing> = staged
            .par_iter()
            .map(|s| {
                let routing = router.route(&s.record, &s.resolution);
                for attribution in &routing.attributions {
                    store.apply(attribution);
                }
                store.track(&routing.kind, s.resolution.is_sized());
                routing
            })
            .collect();

        let p = &self.pseudonymizer;
        let mut probe_errors: BTreeMap<&str, u32> = BTreeMap::new();
        for (s, routing) in staged.iter().zip(&routings) {
            if routing.orphaned || routing.cyclic {
                let parent = s.record.parent_identity.as_deref().unwrap_or_default();
                let problem = if routing.cyclic {
                    "whose rollup leads back to it"
                } else {
                    "not seen in this run"
                };
                let message = format!(
                    "{} '{}' references parent '{}' {}; counted in its own bucket",
                    routing.kind,
                    p.apply(PseudonymScope::ObjectName, &s.record.display_name),
                    p.apply_identity(parent),
                    problem,
                );
                log::warn!("{}", message);
                notes.push(DataQualityNote {
                    account: s.record.account.clone(),
                    kind: NoteKind::OrphanedParent,
                    message,
                });
            }
            if s.resolution.probe_errors > 0 {
                *probe_errors.entry(s.record.account.as_str()).or_default() += 1;
            }
        }
        for (account, count) in probe_errors {
            notes.push(DataQualityNote {
                account: account.to_string(),
                kind: NoteKind::ProbeErrors,
                message: format!("{} resources had capacity probe errors", count),
            });
        }
        notes.sort_by(|a, b| {
            (a.account.as_str(), a.kind as u8, a.message.as_str())
                .cmp(&(b.account.as_str(), b.kind as u8, b.message.as_str()))
        });

        for skip in skipped.iter_mut() {
            skip.identity = skip.identity.as_deref().map(|id| p.apply_identity(id));
        }
        skipped.sort_by(|a, b| (&a.account, &a.identity).cmp(&(&b.account, &b.identity)));

        let details = if self.settings.include_details {
            build_details(p, &staged, &routings)
        } else {
            Vec::new()
        };

        let snapshot = store.snapshot();
        let protection = protection::correlate(&snapshot, &protection_records);

        log::info!(
            "Aggregated {} resources from {} accounts into {} cells",
            staged.len(),
            accounts.len(),
            snapshot.len()
        );

        CapacityReport {
            metadata: ReportMetadata {
                run_id: uuid::Uuid::new_v4().to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                storage_mode: self.settings.storage_mode,
                anonymize_scope: self.settings.anonymize_scope,
                generated_salt: p.generated_salt().map(str::to_string),
                accounts: accounts.len(),
                resources: staged.len(),
                duration_ms: self.started.elapsed().as_millis() as u64,
            },
            totals: store.totals_by_workload(),
            by_region: snapshot.iter().map(RegionWorkloadRow::from).collect(),
            completeness: store.completeness(),
            protection,
            details,
            skipped,
            data_quality: notes,
        }
    }
}

fn build_details(
    p: &Pseudonymizer,
    staged: &[StagedResource],
    routings: &[Routing],
) -> Vec<ResourceDetail> {
    let keep_labels = !p.scope().is_active();
    let mut details: Vec<ResourceDetail> = staged
        .iter()
        .zip(routings)
        .map(|(s, routing)| ResourceDetail {
            account: s.record.account.clone(),
            resource_group: p.apply_opt(
                PseudonymScope::ResourceGroupName,
                s.record.resource_group.as_deref(),
            ),
            resource: p.apply(PseudonymScope::ObjectName, &s.record.display_name),
            workload: routing.kind.clone(),
            region: s.record.region.clone(),
            resolved_gib: units::to_gib(s.resolution.bytes),
            contributed_gib: units::to_gib(routing.contributed_bytes()),
            step: s.resolution.step,
            attributed_to: routing
                .attributed_to
                .as_ref()
                .map(|k| format!("{}@{}", k.workload.label(), k.region)),
            labels: if keep_labels {
                s.record.labels.clone()
            } else {
                BTreeMap::new()
            },
        })
        .collect();
    details.sort_by(|a, b| {
        (a.workload.label(), &a.region, &a.account, &a.resource)
            .cmp(&(b.workload.label(), &b.region, &b.account, &b.resource))
    });
    details
}

/// Delivery handle for one account's collector.
pub struct AccountSink<'a> {
    engine: &'a CensusEngine,
    account: String,
}

impl AccountSink<'_> {
    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn resource(&self, raw: RawResource, probe: &dyn CapacityProbe) -> bool {
        self.engine.submit(&self.account, raw, probe)
    }

    pub fn record(&self, record: ResourceRecord, probe: &dyn CapacityProbe) {
        self.engine.submit_record(record, probe);
    }

    pub fn protection(&self, record: ProtectionRecord) {
        self.engine.submit_protection(record);
    }

    /// Report a record the collector could not turn into a `RawResource`.
    pub fn skip(&self, identity: Option<String>, reason: SkipReason) {
        self.engine.record_skip(RecordSkip {
            account: self.account.clone(),
            identity,
            reason,
        });
    }

    pub fn failure(&self, error: &CollectorError) {
        self.engine.record_failure(&self.account, error);
    }
}

/// Run the whole pipeline over in-memory records from a single probe.
pub fn aggregate(
    settings: EngineSettings,
    records: impl IntoIterator<Item = ResourceRecord>,
    protection: impl IntoIterator<Item = ProtectionRecord>,
    probe: &dyn CapacityProbe,
) -> CapacityReport {
    let engine = CensusEngine::new(settings);
    for record in records {
        if !record.account.is_empty() {
            engine.accounts.lock().insert(record.account.clone());
        }
        engine.submit_record(record, probe);
    }
    for record in protection {
        engine.submit_protection(record);
    }
    engine.finish()
}
