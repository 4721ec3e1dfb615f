//! Score aggregation and blacklist refresh jobs.
//!
//! Each entry point is one bounded batch: read from the store, compute in
//! memory with `repute-scoring`, then write its output in a single step. A
//! store error aborts the run before anything is written, so the previous
//! snapshot or blacklist stays authoritative.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use repute_core::constants::Network;
use repute_core::error::{ReputeError, StoreError};
use repute_core::snapshot::{
    NetworkSummary, OperatorRef, ProviderRef, ProviderScoreSnapshot, RejectedOperator,
    RejectedProvider, TestedProvider, TestedScores, UntestedProvider, UntestedScores,
};
use repute_core::traits::{ReputationStore, SnapshotCache};
use repute_core::types::{
    BenchmarkCategory, BlacklistEntry, BlacklistSubject, NodeId, Provider, TaskOutcome, Timestamp,
    WalletAddress,
};
use repute_scoring::anomaly::{OperatorEvidence, detect_blacklisted_operators};
use repute_scoring::backoff::evaluate_provider_backoff;
use repute_scoring::normalize::CategoryPopulation;
use repute_scoring::penalty::penalized_cpu_scores;
use repute_scoring::uptime::reconstruct_uptime;

use crate::config::NodeConfig;

/// Operator wallet of every provider that advertises one.
fn operator_map(providers: &[Provider]) -> HashMap<NodeId, WalletAddress> {
    providers
        .iter()
        .filter_map(|p| Some((p.id.clone(), p.operator_wallet()?.clone())))
        .collect()
}

/// Uptime of one provider as of `now`; `None` without observations.
pub fn provider_uptime(
    store: &dyn ReputationStore,
    provider: &Provider,
    now: Timestamp,
) -> Result<Option<f64>, StoreError> {
    let history = store.liveness_history(&provider.id)?;
    Ok(reconstruct_uptime(&provider.id, &history, provider.created_at, now))
}

// ---------------------------------------------------------------------------
// Blacklists
// ---------------------------------------------------------------------------

/// Recompute the operator blacklist and replace the stored set.
pub fn refresh_operator_blacklist(
    store: &dyn ReputationStore,
    now: Timestamp,
    config: &NodeConfig,
) -> Result<Vec<BlacklistEntry>, ReputeError> {
    let params = &config.anomaly;
    let providers = store.providers(None)?;
    let operators = operator_map(&providers);
    let online = store.online_providers()?;
    let outcomes = store.task_outcomes_since(params.success_cutoff(now))?;

    let cpu_cutoff = params.cpu_cutoff(now);
    let mut cpu_samples = store.benchmark_samples(BenchmarkCategory::CpuMulti, cpu_cutoff)?;
    cpu_samples.extend(store.benchmark_samples(BenchmarkCategory::CpuSingle, cpu_cutoff)?);

    let evidence = OperatorEvidence {
        outcomes: &outcomes,
        cpu_samples: &cpu_samples,
        operators: &operators,
        online: &online,
    };
    let entries: Vec<BlacklistEntry> = detect_blacklisted_operators(&evidence, params)
        .into_iter()
        .map(|f| f.into_entry(now))
        .collect();

    store.replace_operator_blacklist(&entries)?;
    info!(count = entries.len(), outcomes = outcomes.len(), "pipeline: operator blacklist refreshed");
    Ok(entries)
}

/// Recompute the backoff blacklist and replace the stored set.
///
/// Only outcomes inside the lookback window are read: a provider whose latest
/// outcome is older than that has no countable failures and is eligible.
pub fn refresh_provider_blacklist(
    store: &dyn ReputationStore,
    now: Timestamp,
    config: &NodeConfig,
) -> Result<Vec<BlacklistEntry>, ReputeError> {
    let params = &config.backoff;
    let cutoff = now - params.lookback_days * repute_core::constants::SECS_PER_DAY;

    let mut per_provider: BTreeMap<NodeId, Vec<TaskOutcome>> = BTreeMap::new();
    for outcome in store.task_outcomes_since(cutoff)? {
        per_provider.entry(outcome.provider.clone()).or_default().push(outcome);
    }

    let entries: Vec<BlacklistEntry> = per_provider
        .into_iter()
        .filter_map(|(provider, outcomes)| {
            evaluate_provider_backoff(&provider, &outcomes, now, params).into_entry(provider, now)
        })
        .collect();

    store.replace_provider_blacklist(&entries)?;
    info!(count = entries.len(), "pipeline: provider blacklist refreshed");
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Score aggregation
// ---------------------------------------------------------------------------

#[derive(Default, Clone, Copy)]
struct Tally {
    success: u32,
    total: u32,
}

/// Build the full snapshot for `network` without publishing it.
pub fn build_snapshot(
    store: &dyn ReputationStore,
    network: Network,
    now: Timestamp,
    config: &NodeConfig,
) -> Result<ProviderScoreSnapshot, StoreError> {
    let scoring = &config.scoring;
    let all_providers = store.providers(None)?;
    let online = store.online_providers()?;
    let provider_blacklist = store.provider_blacklist()?;
    let operator_blacklist = store.operator_blacklist()?;

    let by_id: HashMap<&NodeId, &Provider> = all_providers.iter().map(|p| (&p.id, p)).collect();
    let mut network_online: Vec<&Provider> = all_providers
        .iter()
        .filter(|p| p.network == network && online.contains(&p.id))
        .collect();
    network_online.sort_by(|a, b| a.id.cmp(&b.id));

    let mut summary = NetworkSummary::default();
    for p in all_providers.iter().filter(|p| online.contains(&p.id)) {
        match p.network {
            Network::Main => summary.total_online_providers_mainnet += 1,
            Network::Test => summary.total_online_providers_testnet += 1,
        }
    }

    // --- Rejections ---

    let mut rejected_ids: HashSet<&NodeId> = HashSet::new();
    let mut rejected_providers = Vec::new();
    for entry in &provider_blacklist {
        let BlacklistSubject::Provider(id) = &entry.subject else {
            continue;
        };
        let Some(provider) = by_id.get(id) else {
            continue;
        };
        if provider.network != network {
            continue;
        }
        rejected_ids.insert(&provider.id);
        rejected_providers.push(RejectedProvider {
            provider: ProviderRef::from(*provider),
            reason: entry.reason.clone(),
        });
    }

    let blocked_wallets: HashSet<&WalletAddress> = operator_blacklist
        .iter()
        .filter_map(|e| match &e.subject {
            BlacklistSubject::Operator(w) => Some(w),
            BlacklistSubject::Provider(_) => None,
        })
        .collect();
    let rejected_operators: Vec<RejectedOperator> = operator_blacklist
        .iter()
        .filter_map(|e| match &e.subject {
            BlacklistSubject::Operator(w) => Some(RejectedOperator {
                operator: OperatorRef {
                    wallet_address: w.clone(),
                },
                reason: e.reason.clone(),
            }),
            BlacklistSubject::Provider(_) => None,
        })
        .collect();

    let operator_rejected = network_online
        .iter()
        .filter(|p| !rejected_ids.contains(&p.id))
        .filter(|p| p.operator_wallet().is_some_and(|w| blocked_wallets.contains(w)))
        .count();
    summary.total_rejected_providers = rejected_providers.len() + operator_rejected;

    // --- Populations ---

    let mut tallies: HashMap<NodeId, Tally> = HashMap::new();
    for outcome in store.task_outcomes_since(scoring.scoring_cutoff(now))? {
        let t = tallies.entry(outcome.provider).or_default();
        t.total += 1;
        if outcome.success {
            t.success += 1;
        }
    }

    let normalize = scoring.normalize_params();
    let bench_cutoff = normalize.cutoff(now);
    let mut populations = Vec::with_capacity(BenchmarkCategory::ALL.len());
    let mut cpu_single = HashMap::new();
    let mut cpu_multi = HashMap::new();
    for category in BenchmarkCategory::ALL {
        let samples = store.benchmark_samples(category, bench_cutoff)?;
        match category {
            BenchmarkCategory::CpuSingle => {
                cpu_single = penalized_cpu_scores(category, &samples, scoring.penalty_history_len)
            }
            BenchmarkCategory::CpuMulti => {
                cpu_multi = penalized_cpu_scores(category, &samples, scoring.penalty_history_len)
            }
            _ => {}
        }
        populations.push(CategoryPopulation::from_samples(category, &samples, normalize.recent_n));
    }

    // --- Per-provider scores ---

    let mut snapshot = ProviderScoreSnapshot::empty(network, now);
    for provider in network_online {
        if rejected_ids.contains(&provider.id)
            || provider
                .operator_wallet()
                .is_some_and(|w| blocked_wallets.contains(w))
        {
            continue;
        }
        let uptime = provider_uptime(store, provider, now)?;
        let provider_ref = ProviderRef::from(provider);

        match tallies.get(&provider.id) {
            Some(t) if t.total > 0 => {
                let benchmarks = populations
                    .iter()
                    .map(|pop| {
                        let category = pop.category();
                        (category, pop.score(&provider.id, category.direction()))
                    })
                    .collect();
                snapshot.tested_providers.push(TestedProvider {
                    provider: provider_ref,
                    scores: TestedScores {
                        success_rate: f64::from(t.success) / f64::from(t.total),
                        uptime,
                        cpu_single_thread_score: cpu_single.get(&provider.id).copied(),
                        cpu_multi_thread_score: cpu_multi.get(&provider.id).copied(),
                        benchmarks,
                    },
                });
            }
            _ => snapshot.untested_providers.push(UntestedProvider {
                provider: provider_ref,
                scores: UntestedScores { uptime },
            }),
        }
    }

    snapshot.rejected_providers = rejected_providers;
    snapshot.rejected_operators = rejected_operators;
    snapshot.summary = summary;
    debug!(
        %network,
        tested = snapshot.tested_providers.len(),
        untested = snapshot.untested_providers.len(),
        "pipeline: snapshot built"
    );
    Ok(snapshot)
}

/// Build the snapshot for `network` and publish it to `cache`.
///
/// Nothing is published when the build fails.
pub fn aggregate_scores(
    store: &dyn ReputationStore,
    cache: &dyn SnapshotCache,
    network: Network,
    now: Timestamp,
    config: &NodeConfig,
) -> Result<ProviderScoreSnapshot, ReputeError> {
    let snapshot = build_snapshot(store, network, now, config)?;
    cache.publish(snapshot.clone())?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use repute_core::memory::{MemorySnapshotCache, MemoryStore};
    use repute_core::types::{LivenessObservation, PaymentAddresses, PaymentPlatform};

    fn id(n: u8) -> String {
        format!("0x{}", format!("{n:02x}").repeat(20))
    }

    fn node(n: u8) -> NodeId {
        NodeId::parse(&id(n)).unwrap()
    }

    fn provider(n: u8, wallet: u8, platform: PaymentPlatform) -> Provider {
        let mut addrs = PaymentAddresses::new();
        addrs.insert(platform, WalletAddress::parse(&id(wallet)).unwrap());
        Provider::new(node(n), Some(format!("p{n}")), 0, addrs)
    }

    fn online(store: &MemoryStore, n: u8, ts: Timestamp) {
        store
            .record_liveness(&LivenessObservation {
                node_id: node(n),
                online: true,
                timestamp: ts,
            })
            .unwrap();
    }

    #[test]
    fn untested_and_tested_are_split_by_outcomes() {
        let store = MemoryStore::new();
        for n in [1, 2] {
            store
                .upsert_provider(&provider(n, 100 + n, PaymentPlatform::Erc20MainnetGlm))
                .unwrap();
            online(&store, n, 0);
        }
        store
            .record_task_outcome(&TaskOutcome {
                provider: node(1),
                task_id: 1,
                success: true,
                error: None,
                cost: Some(0.1),
                timestamp: 50,
            })
            .unwrap();

        let cache = MemorySnapshotCache::new();
        let snap =
            aggregate_scores(&store, &cache, Network::Main, 100, &NodeConfig::default()).unwrap();
        assert_eq!(snap.tested_providers.len(), 1);
        assert_eq!(snap.tested_providers[0].scores.success_rate, 1.0);
        assert_eq!(snap.tested_providers[0].scores.uptime, Some(1.0));
        assert_eq!(snap.untested_providers.len(), 1);
        assert_eq!(snap.untested_providers[0].provider.id, node(2));
        assert_eq!(snap.summary.total_online_providers_mainnet, 2);
        assert_eq!(cache.latest(Network::Main).unwrap().generated_at, 100);
    }

    #[test]
    fn testnet_providers_stay_out_of_main_snapshot() {
        let store = MemoryStore::new();
        store
            .upsert_provider(&provider(1, 101, PaymentPlatform::Erc20HoleskyTglm))
            .unwrap();
        online(&store, 1, 0);
        let snap = build_snapshot(&store, Network::Main, 10, &NodeConfig::default()).unwrap();
        assert_eq!(snap.scored_count(), 0);
        assert_eq!(snap.summary.total_online_providers_testnet, 1);
    }

    #[test]
    fn blacklisted_operator_providers_are_counted_as_rejected() {
        let store = MemoryStore::new();
        store
            .upsert_provider(&provider(1, 101, PaymentPlatform::Erc20MainnetGlm))
            .unwrap();
        online(&store, 1, 0);
        store
            .replace_operator_blacklist(&[BlacklistEntry::operator(
                WalletAddress::parse(&id(101)).unwrap(),
                "bad",
                0,
            )])
            .unwrap();
        let snap = build_snapshot(&store, Network::Main, 10, &NodeConfig::default()).unwrap();
        assert_eq!(snap.scored_count(), 0);
        assert_eq!(snap.rejected_operators.len(), 1);
        assert_eq!(snap.summary.total_rejected_providers, 1);
    }
}
