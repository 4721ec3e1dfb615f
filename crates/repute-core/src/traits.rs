//! Trait interfaces between the engine and its collaborators.
//!
//! - [`ReputationStore`]: the persistent store of facts and blacklist sets
//!   (repute-node implements it on RocksDB; [`MemoryStore`](crate::memory::MemoryStore) for tests)
//! - [`SnapshotCache`]: the read-store the aggregation pipeline publishes to
//!
//! Handles are constructed once at process start and passed to every job run.

use std::collections::HashSet;

use crate::constants::Network;
use crate::error::{SnapshotError, StoreError};
use crate::snapshot::ProviderScoreSnapshot;
use crate::types::{
    BenchmarkCategory, BenchmarkSample, BlacklistEntry, LivenessObservation, NodeId, Provider,
    TaskOutcome, Timestamp,
};

/// Queryable store of providers, observations, samples, outcomes, and blacklists.
///
/// Read methods return records in ascending timestamp order. Blacklist
/// replacement must be atomic: a concurrent reader sees either the complete
/// previous set or the complete new set, never an empty or partial one.
pub trait ReputationStore: Send + Sync {
    // --- Writes from ingestion collaborators ---

    /// Insert or replace provider metadata. The provider id is the key.
    fn upsert_provider(&self, provider: &Provider) -> Result<(), StoreError>;

    /// Append a liveness observation unless it repeats the state of the node's
    /// previous observation in time.
    ///
    /// Observations may arrive out of order; a late one is placed by its
    /// timestamp and never displaces a newer latest state. Returns `true`
    /// when the observation was appended.
    fn record_liveness(&self, observation: &LivenessObservation) -> Result<bool, StoreError>;

    /// Append a benchmark sample.
    fn record_benchmark(&self, sample: &BenchmarkSample) -> Result<(), StoreError>;

    /// Append a task outcome.
    fn record_task_outcome(&self, outcome: &TaskOutcome) -> Result<(), StoreError>;

    // --- Reads ---

    /// Look up one provider.
    fn provider(&self, id: &NodeId) -> Result<Option<Provider>, StoreError>;

    /// All providers, optionally restricted to one network.
    fn providers(&self, network: Option<Network>) -> Result<Vec<Provider>, StoreError>;

    /// Full liveness history of a node, ascending by timestamp.
    fn liveness_history(&self, node: &NodeId) -> Result<Vec<LivenessObservation>, StoreError>;

    /// Latest liveness observation of a node.
    ///
    /// Default implementation takes the tail of [`liveness_history`](Self::liveness_history).
    fn latest_liveness(&self, node: &NodeId) -> Result<Option<LivenessObservation>, StoreError> {
        Ok(self.liveness_history(node)?.pop())
    }

    /// Nodes whose latest liveness observation is "online".
    fn online_providers(&self) -> Result<HashSet<NodeId>, StoreError>;

    /// Samples of one category at or after `since`, ascending by timestamp.
    fn benchmark_samples(
        &self,
        category: BenchmarkCategory,
        since: Timestamp,
    ) -> Result<Vec<BenchmarkSample>, StoreError>;

    /// All task outcomes at or after `since`, ascending by timestamp.
    fn task_outcomes_since(&self, since: Timestamp) -> Result<Vec<TaskOutcome>, StoreError>;

    // --- Blacklist sets ---

    /// Atomically replace the provider-scoped blacklist.
    fn replace_provider_blacklist(&self, entries: &[BlacklistEntry]) -> Result<(), StoreError>;

    /// Atomically replace the operator-scoped blacklist.
    fn replace_operator_blacklist(&self, entries: &[BlacklistEntry]) -> Result<(), StoreError>;

    /// Current provider-scoped blacklist.
    fn provider_blacklist(&self) -> Result<Vec<BlacklistEntry>, StoreError>;

    /// Current operator-scoped blacklist.
    fn operator_blacklist(&self) -> Result<Vec<BlacklistEntry>, StoreError>;
}

/// Read-store holding the latest published snapshot per network.
pub trait SnapshotCache: Send + Sync {
    /// Replace the current snapshot for the snapshot's network in one step.
    fn publish(&self, snapshot: ProviderScoreSnapshot) -> Result<(), SnapshotError>;

    /// Latest snapshot for a network, or [`SnapshotError::NotYetAvailable`].
    fn latest(&self, network: Network) -> Result<std::sync::Arc<ProviderScoreSnapshot>, SnapshotError>;
}
