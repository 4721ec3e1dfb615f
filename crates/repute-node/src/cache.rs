//! Snapshot read-store shared between the aggregation job and the RPC server.
//!
//! One slot per network segment. Publishing swaps the slot's `Arc` in a single
//! map insert, so a reader holds either the previous snapshot or the new one.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use repute_core::constants::Network;
use repute_core::error::SnapshotError;
use repute_core::snapshot::ProviderScoreSnapshot;
use repute_core::traits::SnapshotCache;

/// Latest snapshot per network, safe for concurrent publish and read.
#[derive(Default)]
pub struct SharedSnapshotCache {
    slots: DashMap<Network, Arc<ProviderScoreSnapshot>>,
}

impl SharedSnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot for `network`, serialised as JSON.
    pub fn latest_json(&self, network: Network) -> Result<String, SnapshotError> {
        let snapshot = self.latest(network)?;
        serde_json::to_string(snapshot.as_ref()).map_err(|e| SnapshotError::Encoding(e.to_string()))
    }

    /// Networks with a published snapshot.
    pub fn published(&self) -> Vec<Network> {
        let mut out: Vec<Network> = self.slots.iter().map(|e| *e.key()).collect();
        out.sort();
        out
    }
}

impl SnapshotCache for SharedSnapshotCache {
    fn publish(&self, snapshot: ProviderScoreSnapshot) -> Result<(), SnapshotError> {
        let network = snapshot.network;
        info!(
            %network,
            tested = snapshot.tested_providers.len(),
            untested = snapshot.untested_providers.len(),
            rejected = snapshot.summary.total_rejected_providers,
            "cache: snapshot published"
        );
        self.slots.insert(network, Arc::new(snapshot));
        Ok(())
    }

    fn latest(&self, network: Network) -> Result<Arc<ProviderScoreSnapshot>, SnapshotError> {
        self.slots
            .get(&network)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or(SnapshotError::NotYetAvailable(network))
    }
}
