//! Attribution Router.
//!
//! Decides which (workload, region) cell a resource is counted in, how many
//! bytes it contributes there, and whether those bytes roll into a parent's
//! cell instead. Rules, in order:
//!
//! 1. `AttributeToParent` with the parent seen this run: bytes go to the
//!    cell the parent is itself counted in, following the parent's own
//!    `AttributeToParent` link when it has one. Count delta 0.
//! 2. Parent declared but never seen, or the parent chain leads back to the
//!    resource: route into the resource's own cell as if `OwnBucket`, so
//!    capacity is never silently lost.
//! 3. Otherwise: own cell, count delta 1.
//!
//! Storage hierarchies are gated by [`StorageAggregationMode`] so that an
//! account-level figure and its sub-service figures never both contribute.

use super::config::StorageAggregationMode;
use super::resolver::Resolution;
use super::types::{AggregateKey, ResourceRecord, RollupPolicy, StorageRole, WorkloadKind};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct IndexEntry {
    key: AggregateKey,
    /// Parent the entry's bytes roll into, for `AttributeToParent` records
    rolls_into: Option<String>,
}

/// Identity → own aggregation key and rollup link of every resource routed
/// in this run.
#[derive(Debug, Clone, Default)]
pub struct ParentIndex {
    entries: HashMap<String, IndexEntry>,
}

impl ParentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<'a>(records: impl IntoIterator<Item = &'a ResourceRecord>) -> Self {
        let mut index = Self::new();
        for record in records {
            index.insert(record);
        }
        index
    }

    /// Register a resource as seen. When an identity is registered twice the
    /// smallest entry is kept, so the index is independent of the order
    /// records arrived in.
    pub fn insert(&mut self, record: &ResourceRecord) {
        let entry = IndexEntry {
            key: AggregateKey::new(effective_kind(record), &record.region),
            rolls_into: match record.rollup {
                RollupPolicy::AttributeToParent => record.parent_identity.clone(),
                _ => None,
            },
        };
        self.entries
            .entry(record.identity.clone())
            .and_modify(|existing| {
                if entry < *existing {
                    *existing = entry.clone();
                }
            })
            .or_insert(entry);
    }

    /// Own cell of a seen resource.
    pub fn get(&self, identity: &str) -> Option<&AggregateKey> {
        self.entries.get(identity).map(|e| &e.key)
    }

    /// Cell that bytes attributed from `origin` to `parent` end up in.
    ///
    /// Follows rollup links from `parent` until a resource that is counted in
    /// its own cell. Returns `None` when the links lead back to `origin`. A
    /// cycle that does not contain `origin` ends at the first resource of the
    /// cycle reached, which is itself counted in its own cell.
    pub fn terminal(&self, origin: &str, parent: &str) -> Option<&AggregateKey> {
        if parent == origin {
            return None;
        }
        let mut seen: HashSet<&str> = HashSet::from([origin]);
        let mut current = parent;
        loop {
            let entry = self.entries.get(current)?;
            seen.insert(current);
            let next = entry
                .rolls_into
                .as_deref()
                .filter(|next| self.entries.contains_key(*next));
            match next {
                Some(next) if next == origin => return None,
                Some(next) if seen.contains(next) => return self.get(next),
                Some(next) => current = next,
                None => return Some(&entry.key),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One increment request for the aggregation store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribution {
    pub key: AggregateKey,
    pub count_delta: u64,
    pub byte_delta: u64,
}

/// Routing decision for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    pub attributions: Vec<Attribution>,
    /// Kind the resource is tracked under for completeness
    pub kind: WorkloadKind,
    /// Parent cell that received the bytes, when rule 1 applied
    pub attributed_to: Option<AggregateKey>,
    /// Parent declared but not seen (rule 2)
    pub orphaned: bool,
    /// Rollup links lead back to this resource (rule 2)
    pub cyclic: bool,
}

impl Routing {
    /// Bytes this resource adds to the aggregate, across all cells.
    pub fn contributed_bytes(&self) -> u64 {
        self.attributions
            .iter()
            .map(|a| a.byte_delta)
            .fold(0, u64::saturating_add)
    }
}

/// Routes resources against one run's parent index.
pub struct AttributionRouter<'a> {
    mode: StorageAggregationMode,
    parents: &'a ParentIndex,
}

impl<'a> AttributionRouter<'a> {
    pub fn new(mode: StorageAggregationMode, parents: &'a ParentIndex) -> Self {
        Self { mode, parents }
    }

    pub fn route(&self, record: &ResourceRecord, resolution: &Resolution) -> Routing {
        let kind = effective_kind(record);
        let parent_key = record
            .parent_identity
            .as_deref()
            .and_then(|parent| self.parents.get(parent));
        let orphaned = record.parent_identity.is_some() && parent_key.is_none();
        let bytes = self.contributable_bytes(record, &kind, parent_key, resolution.bytes);

        let target = match (record.rollup, record.parent_identity.as_deref(), parent_key) {
            (RollupPolicy::AttributeToParent, Some(parent), Some(_)) => {
                Some(self.parents.terminal(&record.identity, parent))
            }
            _ => None,
        };

        match target {
            Some(Some(cell)) => Routing {
                attributions: vec![Attribution {
                    key: cell.clone(),
                    count_delta: 0,
                    byte_delta: bytes,
                }],
                kind,
                attributed_to: Some(cell.clone()),
                orphaned: false,
                cyclic: false,
            },
            _ => Routing {
                attributions: vec![Attribution {
                    key: AggregateKey::new(kind.clone(), &record.region),
                    count_delta: 1,
                    byte_delta: bytes,
                }],
                kind,
                attributed_to: None,
                orphaned,
                cyclic: matches!(target, Some(None)),
            },
        }
    }

    /// Bytes the resource may contribute under the storage mode.
    fn contributable_bytes(
        &self,
        record: &ResourceRecord,
        kind: &WorkloadKind,
        parent: Option<&AggregateKey>,
        resolved: u64,
    ) -> u64 {
        match kind.storage_role() {
            StorageRole::Account => match self.mode {
                StorageAggregationMode::AccountLevel => resolved,
                StorageAggregationMode::ServiceLevel => 0,
            },
            StorageRole::Service | StorageRole::Standalone if is_sub_service(record, kind) => {
                let covered_by_account = parent
                    .map(|p| p.workload.storage_role() == StorageRole::Account)
                    .unwrap_or(false);
                if covered_by_account && self.mode == StorageAggregationMode::AccountLevel {
                    0
                } else {
                    resolved
                }
            }
            _ => resolved,
        }
    }
}

/// Disks without an owner are reported separately as unattached.
pub fn effective_kind(record: &ResourceRecord) -> WorkloadKind {
    match record.workload {
        WorkloadKind::ManagedDisk if record.parent_identity.is_none() => {
            WorkloadKind::UnattachedDisk
        }
        _ => record.workload.clone(),
    }
}

fn is_sub_service(record: &ResourceRecord, kind: &WorkloadKind) -> bool {
    record.rollup == RollupPolicy::OwnBucketExcludedFromParentDouble
        || kind.storage_role() == StorageRole::Service
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::resolver::ResolutionStep;

    fn sized(bytes: u64) -> Resolution {
        Resolution {
            bytes,
            step: ResolutionStep::Declared,
            probe_errors: 0,
        }
    }

    fn vm() -> ResourceRecord {
        ResourceRecord::new(WorkloadKind::VirtualMachine, "/vm/app01", "eastus")
    }

    #[test]
    fn test_attached_disk_rolls_into_vm() {
        let vm = vm();
        let disk = ResourceRecord::new(WorkloadKind::ManagedDisk, "/disk/os", "westus")
            .with_parent("/vm/app01");
        let index = ParentIndex::build([&vm, &disk]);
        let router = AttributionRouter::new(StorageAggregationMode::ServiceLevel, &index);

        let routing = router.route(&disk, &sized(100));
        assert_eq!(
            routing.attributions,
            vec![Attribution {
                key: AggregateKey::new(WorkloadKind::VirtualMachine, "eastus"),
                count_delta: 0,
                byte_delta: 100,
            }]
        );
        assert_eq!(routing.kind, WorkloadKind::ManagedDisk);
        assert!(!routing.orphaned);
    }

    #[test]
    fn test_orphaned_disk_falls_back_to_own_bucket() {
        let disk = ResourceRecord::new(WorkloadKind::ManagedDisk, "/disk/data", "westus")
            .with_parent("/vm/gone");
        let index = ParentIndex::build([&disk]);
        let router = AttributionRouter::new(StorageAggregationMode::ServiceLevel, &index);

        let routing = router.route(&disk, &sized(64));
        assert!(routing.orphaned);
        assert_eq!(routing.attributions[0].key.workload, WorkloadKind::ManagedDisk);
        assert_eq!(routing.attributions[0].key.region, "westus");
        assert_eq!(routing.attributions[0].count_delta, 1);
        assert_eq!(routing.contributed_bytes(), 64);
    }

    #[test]
    fn test_unowned_disk_is_unattached() {
        let disk = ResourceRecord::new(WorkloadKind::ManagedDisk, "/disk/spare", "eastus");
        let index = ParentIndex::build([&disk]);
        let router = AttributionRouter::new(StorageAggregationMode::ServiceLevel, &index);

        let routing = router.route(&disk, &sized(10));
        assert_eq!(routing.kind, WorkloadKind::UnattachedDisk);
        assert_eq!(routing.attributions[0].key.workload, WorkloadKind::UnattachedDisk);
        assert_eq!(routing.attributions[0].count_delta, 1);
    }

    #[test]
    fn test_duplicate_identity_resolves_independent_of_order() {
        let east = ResourceRecord::new(WorkloadKind::VirtualMachine, "/vm/dup", "eastus");
        let west = ResourceRecord::new(WorkloadKind::VirtualMachine, "/vm/dup", "westus");
        let a = ParentIndex::build([&east, &west]);
        let b = ParentIndex::build([&west, &east]);
        assert_eq!(a.get("/vm/dup"), b.get("/vm/dup"));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_chained_rollup_lands_in_terminal_cell() {
        let vm = vm();
        let disk = ResourceRecord::new(WorkloadKind::ManagedDisk, "/disk/os", "eastus")
            .with_parent("/vm/app01");
        let snapshot =
            ResourceRecord::new(WorkloadKind::Other("Snapshot".into()), "/snap/os-1", "eastus")
                .with_parent("/disk/os")
                .with_rollup(RollupPolicy::AttributeToParent);
        let index = ParentIndex::build([&vm, &disk, &snapshot]);
        let router = AttributionRouter::new(StorageAggregationMode::ServiceLevel, &index);

        let routing = router.route(&snapshot, &sized(5));
        let vm_cell = AggregateKey::new(WorkloadKind::VirtualMachine, "eastus");
        assert_eq!(routing.attributions[0].key, vm_cell);
        assert_eq!(routing.attributions[0].count_delta, 0);
        assert_eq!(routing.attributed_to, Some(vm_cell));
    }

    #[test]
    fn test_self_parent_is_counted_in_own_cell() {
        let vm = vm()
            .with_parent("/vm/app01")
            .with_rollup(RollupPolicy::AttributeToParent);
        let index = ParentIndex::build([&vm]);
        let router = AttributionRouter::new(StorageAggregationMode::ServiceLevel, &index);

        let routing = router.route(&vm, &sized(0));
        assert!(routing.cyclic);
        assert_eq!(routing.attributions[0].key.workload, WorkloadKind::VirtualMachine);
        assert_eq!(routing.attributions[0].count_delta, 1);
    }

    #[test]
    fn test_parent_cycle_members_keep_own_cells() {
        let a = ResourceRecord::new(WorkloadKind::ManagedDisk, "/disk/a", "eastus")
            .with_parent("/disk/b");
        let b = ResourceRecord::new(WorkloadKind::ManagedDisk, "/disk/b", "eastus")
            .with_parent("/disk/a");
        let leaf = ResourceRecord::new(WorkloadKind::ManagedDisk, "/disk/leaf", "eastus")
            .with_parent("/disk/a");
        let index = ParentIndex::build([&a, &b, &leaf]);
        let router = AttributionRouter::new(StorageAggregationMode::ServiceLevel, &index);

        for member in [&a, &b] {
            let routing = router.route(member, &sized(10));
            assert!(routing.cyclic);
            assert_eq!(routing.attributions[0].count_delta, 1);
        }
        let routing = router.route(&leaf, &sized(10));
        assert!(!routing.cyclic);
        assert_eq!(routing.attributions[0].key.workload, WorkloadKind::ManagedDisk);
        assert_eq!(routing.attributions[0].count_delta, 0);
    }

    #[test]
    fn test_storage_mode_exclusivity() {
        let account = ResourceRecord::new(WorkloadKind::StorageAccount, "/sa/acct", "eastus");
        let share = ResourceRecord::new(WorkloadKind::FileShare, "/sa/acct/shares/a", "eastus")
            .with_parent("/sa/acct");
        let index = ParentIndex::build([&account, &share]);

        let service = AttributionRouter::new(StorageAggregationMode::ServiceLevel, &index);
        assert_eq!(service.route(&account, &sized(500)).contributed_bytes(), 0);
        assert_eq!(service.route(&share, &sized(100)).contributed_bytes(), 100);

        let account_level = AttributionRouter::new(StorageAggregationMode::AccountLevel, &index);
        assert_eq!(account_level.route(&account, &sized(500)).contributed_bytes(), 500);
        let routed = account_level.route(&share, &sized(100));
        assert_eq!(routed.contributed_bytes(), 0);
        assert_eq!(routed.attributions[0].count_delta, 1);
    }

    #[test]
    fn test_orphaned_sub_service_keeps_bytes_in_account_mode() {
        let share = ResourceRecord::new(WorkloadKind::FileShare, "/sa/x/shares/a", "eastus")
            .with_parent("/sa/x");
        let index = ParentIndex::build([&share]);
        let router = AttributionRouter::new(StorageAggregationMode::AccountLevel, &index);

        let routing = router.route(&share, &sized(42));
        assert!(routing.orphaned);
        assert_eq!(routing.contributed_bytes(), 42);
    }

    #[test]
    fn test_sub_service_attributed_to_account_is_not_double_counted() {
        let account = ResourceRecord::new(WorkloadKind::StorageAccount, "/sa/acct", "eastus");
        let blob = ResourceRecord::new(WorkloadKind::BlobStorage, "/sa/acct/blob", "eastus")
            .with_parent("/sa/acct")
            .with_rollup(RollupPolicy::AttributeToParent);
        let index = ParentIndex::build([&account, &blob]);
        let router = AttributionRouter::new(StorageAggregationMode::AccountLevel, &index);

        let total = router.route(&account, &sized(500)).contributed_bytes()
            + router.route(&blob, &sized(200)).contributed_bytes();
        assert_eq!(total, 500);
    }
}
