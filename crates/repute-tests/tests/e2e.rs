//! End-to-end tests: jobs and RPC handlers over a seeded in-memory store.
//!
//! Population used throughout (all online since t=0, outcomes in the last hour):
//!
//! | provider | network | wallet | outcomes              | expected            |
//! |----------|---------|--------|-----------------------|---------------------|
//! | 1..=3    | main    | own    | 6 successes           | tested              |
//! | 4        | main    | own    | 5 successes, 1 failure| backoff-rejected    |
//! | 5        | main    | own    | 5 failures, 1 success | operator-rejected   |
//! | 6        | main    | own    | none                  | untested            |
//! | 9        | test    | own    | none                  | untested (test)     |

use std::sync::Arc;

use repute_core::constants::{Network, SECS_PER_DAY};
use repute_core::memory::{MemorySnapshotCache, MemoryStore};
use repute_core::query::ProviderFilter;
use repute_core::traits::ReputationStore;
use repute_core::types::{BlacklistSubject, Timestamp};
use repute_node_lib::node::{Job, Node};
use repute_node_lib::rpc::{
    RPC_INVALID_PARAMETER, RPC_NOT_FOUND, RPC_NOT_YET_AVAILABLE, ReputeRpcServer, RpcServerImpl,
};
use repute_node_lib::NodeConfig;
use repute_tests::helpers::{node, outcome, provider, seed_online, seed_outcomes, wallet};

const NOW: Timestamp = 5 * SECS_PER_DAY;

fn seeded_node() -> Arc<Node> {
    let store = MemoryStore::new();
    for seed in 1u8..=6 {
        seed_online(&store, &provider(seed, Network::Main, seed + 100, 0));
    }
    seed_online(&store, &provider(9, Network::Test, 109, 0));

    let start = NOW - 3_600;
    for seed in 1u8..=3 {
        seed_outcomes(&store, seed, 6, 0, start);
    }
    seed_outcomes(&store, 4, 5, 1, start);
    for i in 0..5 {
        store.record_task_outcome(&outcome(5, false, start + i)).unwrap();
    }
    store.record_task_outcome(&outcome(5, true, start + 5)).unwrap();

    Node::with_backends(
        NodeConfig::default(),
        Arc::new(store),
        Arc::new(MemorySnapshotCache::new()),
    )
}

fn run_all(node: &Node, now: Timestamp) {
    for job in Job::ALL {
        node.run_job(job, now).unwrap();
    }
}

#[test]
fn jobs_produce_consistent_snapshot() {
    let n = seeded_node();
    run_all(&n, NOW);

    let operators = n.operator_blacklist().unwrap();
    assert_eq!(operators.len(), 1);
    assert_eq!(operators[0].subject, BlacklistSubject::Operator(wallet(105)));

    let providers = n.provider_blacklist().unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].subject, BlacklistSubject::Provider(node(4)));

    let main = n.snapshot(Network::Main).unwrap();
    let tested: Vec<_> = main.tested_providers.iter().map(|p| p.provider.id.clone()).collect();
    assert_eq!(tested, vec![node(1), node(2), node(3)]);
    for p in &main.tested_providers {
        assert_eq!(p.scores.success_rate, 1.0);
        assert_eq!(p.scores.uptime, Some(1.0));
        assert_eq!(p.scores.cpu_multi_thread_score, None);
    }
    let untested: Vec<_> = main.untested_providers.iter().map(|p| p.provider.id.clone()).collect();
    assert_eq!(untested, vec![node(6)]);

    assert_eq!(main.rejected_providers.len(), 1);
    assert_eq!(main.rejected_providers[0].provider.id, node(4));
    assert!(main.rejected_providers[0].reason.starts_with("Consecutive failures: 1."));
    assert_eq!(main.rejected_operators.len(), 1);
    assert_eq!(main.rejected_operators[0].operator.wallet_address, wallet(105));

    assert_eq!(main.summary.total_online_providers_mainnet, 6);
    assert_eq!(main.summary.total_online_providers_testnet, 1);
    assert_eq!(main.summary.total_rejected_providers, 2);

    let test = n.snapshot(Network::Test).unwrap();
    assert!(test.tested_providers.is_empty());
    assert_eq!(test.untested_providers.len(), 1);
    assert!(test.rejected_providers.is_empty());
    assert_eq!(test.summary.total_rejected_providers, 0);
}

#[test]
fn blacklists_age_out_with_their_evidence() {
    let n = seeded_node();
    run_all(&n, NOW);
    assert_eq!(n.provider_blacklist().unwrap().len(), 1);

    // past both the 3-day success window and the 3-day backoff lookback,
    // but still inside the 10-day scoring window
    let later = NOW + 4 * SECS_PER_DAY;
    run_all(&n, later);

    assert!(n.provider_blacklist().unwrap().is_empty());
    assert!(n.operator_blacklist().unwrap().is_empty());
    let main = n.snapshot(Network::Main).unwrap();
    assert_eq!(main.generated_at, later);
    assert_eq!(main.tested_providers.len(), 5);
    assert!(main.rejected_operators.is_empty());
    assert_eq!(main.summary.total_rejected_providers, 0);
}

#[test]
fn success_reopens_a_gated_provider() {
    let n = seeded_node();
    run_all(&n, NOW);
    n.store().record_task_outcome(&outcome(4, true, NOW - 10)).unwrap();
    n.run_job(Job::ProviderBlacklist, NOW).unwrap();
    assert!(n.provider_blacklist().unwrap().is_empty());
}

#[test]
fn snapshot_serialises_as_camel_case_json() {
    let n = seeded_node();
    run_all(&n, NOW);
    let json = serde_json::to_value(n.snapshot(Network::Main).unwrap().as_ref()).unwrap();
    assert_eq!(json["network"], "main");
    assert_eq!(json["generatedAt"], NOW);
    assert_eq!(json["testedProviders"].as_array().unwrap().len(), 3);
    assert_eq!(json["summary"]["totalRejectedProviders"], 2);
}

#[tokio::test]
async fn rpc_reports_not_yet_available_before_first_run() {
    let rpc = RpcServerImpl::new(seeded_node());
    let err = rpc.get_provider_scores("mainnet".into()).await.unwrap_err();
    assert_eq!(err.code(), RPC_NOT_YET_AVAILABLE);

    let err = rpc.get_provider_scores("ropsten".into()).await.unwrap_err();
    assert_eq!(err.code(), RPC_INVALID_PARAMETER);
}

#[tokio::test]
async fn rpc_serves_published_state() {
    let n = seeded_node();
    run_all(&n, NOW);
    let rpc = RpcServerImpl::new(n);

    let snapshot = rpc.get_provider_scores("polygon".into()).await.unwrap();
    assert_eq!(snapshot.network, Network::Main);
    assert_eq!(snapshot.generated_at, NOW);
    let snapshot = rpc.get_provider_scores("holesky".into()).await.unwrap();
    assert_eq!(snapshot.network, Network::Test);

    assert_eq!(rpc.get_blacklisted_providers().await.unwrap().len(), 1);
    assert_eq!(rpc.get_blacklisted_operators().await.unwrap().len(), 1);
}

#[tokio::test]
async fn rpc_uptime_lookup() {
    let rpc = RpcServerImpl::new(seeded_node());

    let uptime = rpc.get_uptime(node(1).to_string()).await.unwrap();
    assert_eq!(uptime, Some(1.0));

    let err = rpc.get_uptime(node(42).to_string()).await.unwrap_err();
    assert_eq!(err.code(), RPC_NOT_FOUND);

    let err = rpc.get_uptime("not-a-node".into()).await.unwrap_err();
    assert_eq!(err.code(), RPC_INVALID_PARAMETER);
}

#[test]
fn filter_selects_from_the_published_snapshot() {
    let n = seeded_node();
    run_all(&n, NOW);

    let all = n.filter_providers(Network::Main, &ProviderFilter::default(), NOW).unwrap();
    assert_eq!(all, vec![node(1), node(2), node(3), node(6)]);

    // every provider was first seen at t=0, five days before NOW
    let aged = |days| ProviderFilter {
        min_provider_age: Some(days),
        ..Default::default()
    };
    assert_eq!(n.filter_providers(Network::Main, &aged(5), NOW).unwrap().len(), 4);
    assert!(n.filter_providers(Network::Main, &aged(6), NOW).unwrap().is_empty());

    let tested = ProviderFilter {
        min_success_rate: Some(1.0),
        ..Default::default()
    };
    assert_eq!(
        n.filter_providers(Network::Main, &tested, NOW).unwrap(),
        vec![node(1), node(2), node(3)]
    );
}

#[tokio::test]
async fn rpc_check_blacklist_covers_provider_and_wallet() {
    let n = seeded_node();
    run_all(&n, NOW);
    let rpc = RpcServerImpl::new(n);

    let backoff = rpc.check_blacklist(node(4).to_string()).await.unwrap();
    assert_eq!(backoff.node_id, node(4));
    assert!(backoff.is_blacklisted_provider);
    assert!(!backoff.is_blacklisted_wallet);

    let operator = rpc.check_blacklist(node(5).to_string()).await.unwrap();
    assert!(!operator.is_blacklisted_provider);
    assert!(operator.is_blacklisted_wallet);

    let clean = rpc.check_blacklist(node(1).to_string()).await.unwrap();
    assert!(!clean.is_blacklisted_provider && !clean.is_blacklisted_wallet);

    let unknown = rpc.check_blacklist(node(42).to_string()).await.unwrap();
    assert!(!unknown.is_blacklisted_provider && !unknown.is_blacklisted_wallet);

    let err = rpc.check_blacklist("0xzz".into()).await.unwrap_err();
    assert_eq!(err.code(), RPC_INVALID_PARAMETER);

    let json = serde_json::to_value(&operator).unwrap();
    assert_eq!(json["isBlacklistedWallet"], true);
}

#[tokio::test]
async fn rpc_filter_providers() {
    let n = seeded_node();
    let rpc = RpcServerImpl::new(Arc::clone(&n));
    let err = rpc.filter_providers("mainnet".into(), None).await.unwrap_err();
    assert_eq!(err.code(), RPC_NOT_YET_AVAILABLE);

    run_all(&n, NOW);
    let ids = rpc.filter_providers("polygon".into(), None).await.unwrap();
    assert_eq!(ids, vec![node(1), node(2), node(3), node(6)]);

    // no provider has CPU results, so a CPU bound matches nobody
    let cpu = ProviderFilter {
        min_cpu_multi_thread_score: Some(0.0),
        ..Default::default()
    };
    assert!(rpc.filter_providers("mainnet".into(), Some(cpu)).await.unwrap().is_empty());

    let err = rpc.filter_providers("ropsten".into(), None).await.unwrap_err();
    assert_eq!(err.code(), RPC_INVALID_PARAMETER);
}
