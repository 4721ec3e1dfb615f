//! In-memory [`ReputationStore`] and [`SnapshotCache`] implementations.
//!
//! Everything lives in maps behind a single `RwLock`, with no persistence.
//! Suitable for tests and tooling; the production node uses RocksDB
//! (repute-node).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::constants::Network;
use crate::error::{SnapshotError, StoreError};
use crate::snapshot::ProviderScoreSnapshot;
use crate::traits::{ReputationStore, SnapshotCache};
use crate::types::{
    BenchmarkCategory, BenchmarkSample, BlacklistEntry, LivenessObservation, NodeId, Provider,
    TaskOutcome, Timestamp,
};

#[derive(Default)]
struct Inner {
    providers: HashMap<NodeId, Provider>,
    /// Per-node liveness, ascending by timestamp.
    liveness: HashMap<NodeId, Vec<LivenessObservation>>,
    /// Per-category samples, ascending by timestamp.
    benchmarks: HashMap<BenchmarkCategory, Vec<BenchmarkSample>>,
    /// All outcomes, ascending by timestamp.
    outcomes: Vec<TaskOutcome>,
    provider_blacklist: Arc<Vec<BlacklistEntry>>,
    operator_blacklist: Arc<Vec<BlacklistEntry>>,
}

/// In-memory reputation store for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of liveness observations kept for a node.
    pub fn liveness_len(&self, node: &NodeId) -> usize {
        self.inner.read().liveness.get(node).map_or(0, Vec::len)
    }
}

/// Insert keeping `items` sorted by `key`, after any equal keys.
fn insert_sorted<T>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> Timestamp) {
    let ts = key(&item);
    let pos = items.partition_point(|x| key(x) <= ts);
    items.insert(pos, item);
}

impl ReputationStore for MemoryStore {
    fn upsert_provider(&self, provider: &Provider) -> Result<(), StoreError> {
        self.inner
            .write()
            .providers
            .insert(provider.id.clone(), provider.clone());
        Ok(())
    }

    fn record_liveness(&self, observation: &LivenessObservation) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let history = inner.liveness.entry(observation.node_id.clone()).or_default();
        let pos = history.partition_point(|o| o.timestamp <= observation.timestamp);
        if pos > 0 && history[pos - 1].online == observation.online {
            return Ok(false);
        }
        history.insert(pos, observation.clone());
        Ok(true)
    }

    fn record_benchmark(&self, sample: &BenchmarkSample) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let samples = inner.benchmarks.entry(sample.category).or_default();
        insert_sorted(samples, sample.clone(), |s| s.timestamp);
        Ok(())
    }

    fn record_task_outcome(&self, outcome: &TaskOutcome) -> Result<(), StoreError> {
        insert_sorted(&mut self.inner.write().outcomes, outcome.clone(), |o| o.timestamp);
        Ok(())
    }

    fn provider(&self, id: &NodeId) -> Result<Option<Provider>, StoreError> {
        Ok(self.inner.read().providers.get(id).cloned())
    }

    fn providers(&self, network: Option<Network>) -> Result<Vec<Provider>, StoreError> {
        let inner = self.inner.read();
        let mut out: Vec<Provider> = inner
            .providers
            .values()
            .filter(|p| network.is_none_or(|n| p.network == n))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn liveness_history(&self, node: &NodeId) -> Result<Vec<LivenessObservation>, StoreError> {
        Ok(self.inner.read().liveness.get(node).cloned().unwrap_or_default())
    }

    fn online_providers(&self) -> Result<HashSet<NodeId>, StoreError> {
        Ok(self
            .inner
            .read()
            .liveness
            .iter()
            .filter(|(_, h)| h.last().is_some_and(|o| o.online))
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn benchmark_samples(
        &self,
        category: BenchmarkCategory,
        since: Timestamp,
    ) -> Result<Vec<BenchmarkSample>, StoreError> {
        Ok(self
            .inner
            .read()
            .benchmarks
            .get(&category)
            .map(|s| s.iter().filter(|s| s.timestamp >= since).cloned().collect())
            .unwrap_or_default())
    }

    fn task_outcomes_since(&self, since: Timestamp) -> Result<Vec<TaskOutcome>, StoreError> {
        Ok(self
            .inner
            .read()
            .outcomes
            .iter()
            .filter(|o| o.timestamp >= since)
            .cloned()
            .collect())
    }

    fn replace_provider_blacklist(&self, entries: &[BlacklistEntry]) -> Result<(), StoreError> {
        let next = Arc::new(entries.to_vec());
        self.inner.write().provider_blacklist = next;
        Ok(())
    }

    fn replace_operator_blacklist(&self, entries: &[BlacklistEntry]) -> Result<(), StoreError> {
        let next = Arc::new(entries.to_vec());
        self.inner.write().operator_blacklist = next;
        Ok(())
    }

    fn provider_blacklist(&self) -> Result<Vec<BlacklistEntry>, StoreError> {
        Ok(self.inner.read().provider_blacklist.as_ref().clone())
    }

    fn operator_blacklist(&self) -> Result<Vec<BlacklistEntry>, StoreError> {
        Ok(self.inner.read().operator_blacklist.as_ref().clone())
    }
}

/// In-memory snapshot cache holding one snapshot per network.
#[derive(Default)]
pub struct MemorySnapshotCache {
    current: RwLock<HashMap<Network, Arc<ProviderScoreSnapshot>>>,
}

impl MemorySnapshotCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotCache for MemorySnapshotCache {
    fn publish(&self, snapshot: ProviderScoreSnapshot) -> Result<(), SnapshotError> {
        let network = snapshot.network;
        self.current.write().insert(network, Arc::new(snapshot));
        Ok(())
    }

    fn latest(&self, network: Network) -> Result<Arc<ProviderScoreSnapshot>, SnapshotError> {
        self.current
            .read()
            .get(&network)
            .cloned()
            .ok_or(SnapshotError::NotYetAvailable(network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u8) -> NodeId {
        NodeId::parse(&format!("0x{}", format!("{n:02x}").repeat(20))).unwrap()
    }

    fn obs(n: u8, online: bool, ts: Timestamp) -> LivenessObservation {
        LivenessObservation {
            node_id: node(n),
            online,
            timestamp: ts,
        }
    }

    #[test]
    fn repeated_state_is_deduplicated() {
        let store = MemoryStore::new();
        assert!(store.record_liveness(&obs(1, true, 0)).unwrap());
        assert!(!store.record_liveness(&obs(1, true, 10)).unwrap());
        assert!(store.record_liveness(&obs(1, false, 20)).unwrap());
        assert!(!store.record_liveness(&obs(1, false, 30)).unwrap());
        assert_eq!(store.liveness_len(&node(1)), 2);
    }

    #[test]
    fn late_observation_keeps_newer_latest() {
        let store = MemoryStore::new();
        assert!(store.record_liveness(&obs(1, true, 100)).unwrap());
        assert!(store.record_liveness(&obs(1, false, 50)).unwrap());
        assert!(!store.record_liveness(&obs(1, false, 60)).unwrap());
        let history: Vec<_> = store
            .liveness_history(&node(1))
            .unwrap()
            .iter()
            .map(|o| (o.online, o.timestamp))
            .collect();
        assert_eq!(history, vec![(false, 50), (true, 100)]);
        assert!(store.latest_liveness(&node(1)).unwrap().unwrap().online);
        assert!(store.online_providers().unwrap().contains(&node(1)));
    }

    #[test]
    fn online_set_follows_latest_observation() {
        let store = MemoryStore::new();
        store.record_liveness(&obs(1, true, 0)).unwrap();
        store.record_liveness(&obs(2, true, 0)).unwrap();
        store.record_liveness(&obs(2, false, 5)).unwrap();
        let online = store.online_providers().unwrap();
        assert!(online.contains(&node(1)));
        assert!(!online.contains(&node(2)));
    }

    #[test]
    fn samples_come_back_sorted_and_windowed() {
        let store = MemoryStore::new();
        for ts in [30, 10, 20] {
            let s = BenchmarkSample::new(node(1), BenchmarkCategory::CpuMulti, ts as f64, ts).unwrap();
            store.record_benchmark(&s).unwrap();
        }
        let got = store.benchmark_samples(BenchmarkCategory::CpuMulti, 15).unwrap();
        let ts: Vec<_> = got.iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![20, 30]);
    }

    #[test]
    fn blacklist_replacement_drops_stale_entries() {
        let store = MemoryStore::new();
        store
            .replace_provider_blacklist(&[BlacklistEntry::provider(node(1), "a", 0)])
            .unwrap();
        store
            .replace_provider_blacklist(&[BlacklistEntry::provider(node(2), "b", 1)])
            .unwrap();
        let current = store.provider_blacklist().unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].reason, "b");
    }

    #[test]
    fn cache_reports_not_yet_available() {
        let cache = MemorySnapshotCache::new();
        assert_eq!(
            cache.latest(Network::Main).unwrap_err(),
            SnapshotError::NotYetAvailable(Network::Main)
        );
        cache.publish(ProviderScoreSnapshot::empty(Network::Main, 5)).unwrap();
        assert_eq!(cache.latest(Network::Main).unwrap().generated_at, 5);
        assert!(cache.latest(Network::Test).is_err());
    }
}
