//! Shared builders for integration tests.

use repute_core::constants::Network;
use repute_core::traits::ReputationStore;
use repute_core::types::{
    BenchmarkCategory, BenchmarkSample, LivenessObservation, NodeId, PaymentAddresses,
    PaymentPlatform, Provider, TaskOutcome, Timestamp, WalletAddress,
};

fn address(seed: u8) -> String {
    format!("0x{}", format!("{seed:02x}").repeat(20))
}

/// Node id made of one repeated byte.
pub fn node(seed: u8) -> NodeId {
    NodeId::parse(&address(seed)).unwrap()
}

/// Wallet address made of one repeated byte.
pub fn wallet(seed: u8) -> WalletAddress {
    WalletAddress::parse(&address(seed)).unwrap()
}

/// Provider `seed` on `network`, paid to wallet `operator`, first seen at `created_at`.
pub fn provider(seed: u8, network: Network, operator: u8, created_at: Timestamp) -> Provider {
    let platform = match network {
        Network::Main => PaymentPlatform::Erc20PolygonGlm,
        Network::Test => PaymentPlatform::Erc20HoleskyTglm,
    };
    let mut addrs = PaymentAddresses::new();
    addrs.insert(platform, wallet(operator));
    Provider::new(node(seed), Some(format!("provider-{seed}")), created_at, addrs)
}

pub fn observation(seed: u8, online: bool, timestamp: Timestamp) -> LivenessObservation {
    LivenessObservation {
        node_id: node(seed),
        online,
        timestamp,
    }
}

/// Task outcome with a task id unique per (provider, timestamp).
pub fn outcome(seed: u8, success: bool, timestamp: Timestamp) -> TaskOutcome {
    TaskOutcome {
        provider: node(seed),
        task_id: (u64::from(seed) << 40) | (timestamp as u64 & 0xFF_FFFF_FFFF),
        success,
        error: (!success).then(|| "task failed".to_string()),
        cost: success.then_some(0.01),
        timestamp,
    }
}

pub fn sample(
    seed: u8,
    category: BenchmarkCategory,
    value: f64,
    timestamp: Timestamp,
) -> BenchmarkSample {
    BenchmarkSample::new(node(seed), category, value, timestamp).unwrap()
}

/// Register `provider` and mark it online at its first-seen time.
pub fn seed_online(store: &dyn ReputationStore, provider: &Provider) {
    store.upsert_provider(provider).unwrap();
    store
        .record_liveness(&LivenessObservation {
            node_id: provider.id.clone(),
            online: true,
            timestamp: provider.created_at,
        })
        .unwrap();
}

/// Record `successes` successful then `failures` failed outcomes, one second apart from `start`.
pub fn seed_outcomes(
    store: &dyn ReputationStore,
    seed: u8,
    successes: usize,
    failures: usize,
    start: Timestamp,
) {
    let mut ts = start;
    for success in std::iter::repeat_n(true, successes).chain(std::iter::repeat_n(false, failures)) {
        store.record_task_outcome(&outcome(seed, success, ts)).unwrap();
        ts += 1;
    }
}
