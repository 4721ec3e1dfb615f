//! Criterion benchmarks for repute-node storage and aggregation.
//!
//! Covers: liveness writes, blacklist replacement, and a full snapshot build
//! over a RocksDB-backed store.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

use repute_core::constants::Network;
use repute_core::traits::ReputationStore;
use repute_core::types::{
    BenchmarkCategory, BenchmarkSample, BlacklistEntry, LivenessObservation, NodeId,
    PaymentAddresses, PaymentPlatform, Provider, TaskOutcome, WalletAddress,
};
use repute_node_lib::NodeConfig;
use repute_node_lib::pipeline::build_snapshot;
use repute_node_lib::storage::RocksStore;

fn addr(n: u32) -> String {
    format!("0x{:040x}", n)
}

fn node(n: u32) -> NodeId {
    NodeId::parse(&addr(n)).unwrap()
}

/// Store with `count` online mainnet providers, each with outcomes and CPU samples.
fn populated_store(count: u32) -> (TempDir, RocksStore) {
    let dir = TempDir::new().unwrap();
    let store = RocksStore::open(dir.path()).unwrap();
    for n in 0..count {
        let mut addrs = PaymentAddresses::new();
        addrs.insert(
            PaymentPlatform::Erc20PolygonGlm,
            WalletAddress::parse(&addr(1_000_000 + n / 5)).unwrap(),
        );
        store
            .upsert_provider(&Provider::new(node(n), None, 0, addrs))
            .unwrap();
        store
            .record_liveness(&LivenessObservation {
                node_id: node(n),
                online: true,
                timestamp: 10,
            })
            .unwrap();
        for ts in 0..3i64 {
            let value = 1000.0 + f64::from(n) + ts as f64;
            store
                .record_benchmark(
                    &BenchmarkSample::new(node(n), BenchmarkCategory::CpuMulti, value, 100 + ts)
                        .unwrap(),
                )
                .unwrap();
            store
                .record_task_outcome(&TaskOutcome {
                    provider: node(n),
                    task_id: u64::from(n) * 10 + ts as u64,
                    success: (n + ts as u32) % 4 != 0,
                    error: None,
                    cost: None,
                    timestamp: 100 + ts,
                })
                .unwrap();
        }
    }
    (dir, store)
}

fn bench_record_liveness(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = RocksStore::open(dir.path()).unwrap();
    let mut ts = 0i64;

    c.bench_function("record_liveness_toggle", |b| {
        b.iter(|| {
            ts += 1;
            store
                .record_liveness(black_box(&LivenessObservation {
                    node_id: node(1),
                    online: ts % 2 == 0,
                    timestamp: ts,
                }))
                .unwrap()
        })
    });
}

fn bench_replace_blacklist(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = RocksStore::open(dir.path()).unwrap();
    let entries: Vec<BlacklistEntry> = (0..200)
        .map(|n| BlacklistEntry::provider(node(n), "Consecutive failures: 1.", 0))
        .collect();

    c.bench_function("replace_provider_blacklist_200", |b| {
        b.iter(|| store.replace_provider_blacklist(black_box(&entries)).unwrap())
    });
}

fn bench_build_snapshot(c: &mut Criterion) {
    let (_dir, store) = populated_store(200);
    let config = NodeConfig::default();

    c.bench_function("build_snapshot_200", |b| {
        b.iter(|| build_snapshot(&store, Network::Main, black_box(1_000), &config).unwrap())
    });
}

criterion_group!(
    benches,
    bench_record_liveness,
    bench_replace_blacklist,
    bench_build_snapshot,
);
criterion_main!(benches);
