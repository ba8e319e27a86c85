//! Collector contract and the bounded account worker pool.
//!
//! A collector owns everything provider-specific for one account: session
//! setup, enumeration calls, shaping provider payloads into [`RawResource`]s
//! and answering the resolution chain through a [`CapacityProbe`]. It pushes
//! results into an [`AccountSink`] as it goes, so whatever was delivered
//! before a failure or timeout is kept.
//!
//! [`RawResource`]: crate::capacity::RawResource
//! [`CapacityProbe`]: crate::capacity::CapacityProbe

pub mod snapshot;

use crate::capacity::{AccountSink, CensusEngine};
use crate::error::CollectorError;
use futures_util::{StreamExt, stream};
use std::future::Future;
use std::time::Duration;

pub use snapshot::{
    AccountSnapshot, InventorySnapshot, MetricAggregation, MetricSample, SnapshotCollector,
    SnapshotProbe, load_snapshot,
};

/// Per-account source of inventory and protection records.
pub trait InventoryCollector: Send + Sync {
    /// Account or subscription this collector enumerates.
    fn account(&self) -> &str;

    /// Enumerate the account, delivering into `sink`. An `Err` ends the
    /// account early; records already delivered stay in the run.
    fn collect(
        &self,
        sink: &AccountSink<'_>,
    ) -> impl Future<Output = Result<(), CollectorError>> + Send;
}

/// Bounds for the account worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionLimits {
    /// Accounts collected at once (minimum 1)
    pub max_concurrent_accounts: usize,
    /// Wall-clock budget per account
    pub account_timeout: Duration,
}

impl Default for CollectionLimits {
    fn default() -> Self {
        Self {
            max_concurrent_accounts: 4,
            account_timeout: Duration::from_secs(300),
        }
    }
}

impl CollectionLimits {
    pub fn new(max_concurrent_accounts: usize, account_timeout: Duration) -> Self {
        Self {
            max_concurrent_accounts: max_concurrent_accounts.max(1),
            account_timeout,
        }
    }
}

/// How one account's collection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOutcome {
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl CollectionSummary {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.timed_out
    }
}

/// Run every collector against `engine`, at most
/// `limits.max_concurrent_accounts` at a time.
pub async fn run_collectors<C: InventoryCollector>(
    engine: &CensusEngine,
    collectors: &[C],
    limits: &CollectionLimits,
) -> CollectionSummary {
    let outcomes: Vec<AccountOutcome> = stream::iter(collectors)
        .map(|collector| collect_account(engine, collector, limits.account_timeout))
        .buffer_unordered(limits.max_concurrent_accounts.max(1))
        .collect()
        .await;

    let mut summary = CollectionSummary::default();
    for outcome in outcomes {
        match outcome {
            AccountOutcome::Completed => summary.completed += 1,
            AccountOutcome::Failed => summary.failed += 1,
            AccountOutcome::TimedOut => summary.timed_out += 1,
        }
    }
    log::info!(
        "Collected {} accounts ({} completed, {} failed, {} timed out)",
        summary.total(),
        summary.completed,
        summary.failed,
        summary.timed_out
    );
    summary
}

async fn collect_account<C: InventoryCollector>(
    engine: &CensusEngine,
    collector: &C,
    timeout: Duration,
) -> AccountOutcome {
    let sink = engine.sink(collector.account());
    log::debug!("Collecting account {}", sink.account());

    match tokio::time::timeout(timeout, collector.collect(&sink)).await {
        Ok(Ok(())) => AccountOutcome::Completed,
        Ok(Err(e)) => {
            sink.failure(&e);
            AccountOutcome::Failed
        }
        Err(_) => {
            sink.failure(&CollectorError::Timeout {
                account: sink.account().to_string(),
                seconds: timeout.as_secs(),
            });
            AccountOutcome::TimedOut
        }
    }
}
