use cloud_census::capacity::units::ByteUnit;
use cloud_census::capacity::{
    CapacityHint, CapacityReport, EngineSettings, NoTelemetry, ResourceRecord,
    StorageAggregationMode, WorkloadKind, aggregate,
};
use proptest::prelude::*;
use std::collections::HashSet;

const REGIONS: [&str; 3] = ["eastus", "westus", "northeurope"];

fn record_strategy() -> impl Strategy<Value = ResourceRecord> {
    let region = prop::sample::select(REGIONS.to_vec());
    prop_oneof![
        (0u8..6, region.clone()).prop_map(|(id, region)| {
            ResourceRecord::new(WorkloadKind::VirtualMachine, format!("/vm/{id}"), region)
        }),
        (0u8..20, prop::option::of(0u8..8), region.clone(), 0u32..1_000_000).prop_map(
            |(id, parent, region, bytes)| {
                let identity = format!("/disk/{id}");
                let disk = ResourceRecord::new(WorkloadKind::ManagedDisk, identity, region)
                    .with_declared(bytes as f64, ByteUnit::Bytes);
                match parent {
                    Some(p) => disk.with_parent(format!("/vm/{p}")),
                    None => disk,
                }
            }
        ),
        (0u8..4, region.clone(), 0u32..1_000_000).prop_map(|(id, region, bytes)| {
            ResourceRecord::new(WorkloadKind::StorageAccount, format!("/sa/{id}"), region)
                .with_declared(bytes as f64, ByteUnit::Bytes)
        }),
        (0u8..20, 0u8..6, region, 0u32..1_000_000).prop_map(|(id, parent, region, bytes)| {
            let identity = format!("/sa/{parent}/shares/{id}");
            ResourceRecord::new(WorkloadKind::FileShare, identity, region)
                .with_parent(format!("/sa/{parent}"))
                .with_declared(bytes as f64, ByteUnit::Bytes)
        }),
    ]
}

fn declared(record: &ResourceRecord) -> u64 {
    match record.capacity {
        CapacityHint::Declared { quantity, .. } => quantity as u64,
        _ => 0,
    }
}

/// Bytes every record should contribute exactly once under `mode`.
fn expected_total(records: &[ResourceRecord], mode: StorageAggregationMode) -> u64 {
    let accounts: HashSet<&str> = records
        .iter()
        .filter(|r| r.workload == WorkloadKind::StorageAccount)
        .map(|r| r.identity.as_str())
        .collect();
    records
        .iter()
        .map(|r| match (&r.workload, mode) {
            (WorkloadKind::StorageAccount, StorageAggregationMode::AccountLevel) => declared(r),
            (WorkloadKind::StorageAccount, StorageAggregationMode::ServiceLevel) => 0,
            (WorkloadKind::FileShare, StorageAggregationMode::AccountLevel)
                if r.parent_identity.as_deref().is_some_and(|p| accounts.contains(p)) =>
            {
                0
            }
            _ => declared(r),
        })
        .sum()
}

fn run(records: Vec<ResourceRecord>, mode: StorageAggregationMode) -> CapacityReport {
    let settings = EngineSettings::new().with_storage_mode(mode);
    aggregate(settings, records, [], &NoTelemetry)
}

fn mode_strategy() -> impl Strategy<Value = StorageAggregationMode> {
    prop_oneof![
        Just(StorageAggregationMode::AccountLevel),
        Just(StorageAggregationMode::ServiceLevel),
    ]
}

proptest! {
    #[test]
    fn every_byte_is_counted_exactly_once(
        records in prop::collection::vec(record_strategy(), 0..60),
        mode in mode_strategy(),
    ) {
        let expected = expected_total(&records, mode);
        let report = run(records, mode);
        prop_assert_eq!(report.total_bytes(), expected);
        let totals: u64 = report.totals.iter().map(|t| t.bytes).sum();
        prop_assert_eq!(totals, expected);
    }

    #[test]
    fn replaying_input_doubles_totals(
        records in prop::collection::vec(record_strategy(), 0..40),
        mode in mode_strategy(),
    ) {
        let single = run(records.clone(), mode);
        let doubled_input: Vec<ResourceRecord> = records.iter().cloned().chain(records.clone()).collect();
        let doubled = run(doubled_input, mode);

        prop_assert_eq!(doubled.total_bytes(), single.total_bytes() * 2);
        prop_assert_eq!(doubled.total_count(), single.total_count() * 2);
        prop_assert_eq!(doubled.by_region.len(), single.by_region.len());
    }

    #[test]
    fn aggregates_do_not_depend_on_input_order(
        (records, shuffled) in prop::collection::vec(record_strategy(), 0..50)
            .prop_flat_map(|records| (Just(records.clone()), Just(records).prop_shuffle())),
        mode in mode_strategy(),
    ) {
        let a = run(records, mode);
        let b = run(shuffled, mode);
        prop_assert_eq!(a.by_region, b.by_region);
        prop_assert_eq!(a.totals, b.totals);
        prop_assert_eq!(a.completeness, b.completeness);
        prop_assert_eq!(a.data_quality, b.data_quality);
    }
}
