//! Published read model produced by each aggregation run.
//!
//! A [`ProviderScoreSnapshot`] is built completely in memory and then handed
//! to a [`SnapshotCache`](crate::traits::SnapshotCache), which swaps it in as
//! the latest for its network. JSON field names are camelCase.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::Network;
use crate::types::{BenchmarkCategory, NodeId, Provider, Timestamp, WalletAddress};

/// Identity block attached to every provider row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRef {
    pub id: NodeId,
    pub name: Option<String>,
    pub wallet_address: Option<WalletAddress>,
    /// First time the provider was seen.
    pub created_at: Timestamp,
}

impl From<&Provider> for ProviderRef {
    fn from(p: &Provider) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            wallet_address: p.operator_wallet().cloned(),
            created_at: p.created_at,
        }
    }
}

/// Scores for a provider with task history in the scoring window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestedScores {
    pub success_rate: f64,
    pub uptime: Option<f64>,
    pub cpu_single_thread_score: Option<f64>,
    pub cpu_multi_thread_score: Option<f64>,
    /// Population-relative score per benchmark category; `None` when absent.
    pub benchmarks: BTreeMap<BenchmarkCategory, Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestedProvider {
    pub provider: ProviderRef,
    pub scores: TestedScores,
}

/// Uptime-only scores for a provider without task history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UntestedScores {
    pub uptime: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UntestedProvider {
    pub provider: ProviderRef,
    pub scores: UntestedScores,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedProvider {
    pub provider: ProviderRef,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorRef {
    pub wallet_address: WalletAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedOperator {
    pub operator: OperatorRef,
    pub reason: String,
}

/// Population counts published alongside the scores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    pub total_online_providers_mainnet: usize,
    pub total_online_providers_testnet: usize,
    /// Blacklisted providers plus online providers owned by blacklisted operators.
    pub total_rejected_providers: usize,
}

/// Result of one aggregation run for one network segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderScoreSnapshot {
    pub network: Network,
    pub generated_at: Timestamp,
    pub tested_providers: Vec<TestedProvider>,
    pub untested_providers: Vec<UntestedProvider>,
    pub rejected_providers: Vec<RejectedProvider>,
    pub rejected_operators: Vec<RejectedOperator>,
    pub summary: NetworkSummary,
}

impl ProviderScoreSnapshot {
    /// An empty snapshot for `network`, generated at `generated_at`.
    pub fn empty(network: Network, generated_at: Timestamp) -> Self {
        Self {
            network,
            generated_at,
            tested_providers: Vec::new(),
            untested_providers: Vec::new(),
            rejected_providers: Vec::new(),
            rejected_operators: Vec::new(),
            summary: NetworkSummary::default(),
        }
    }

    /// Number of providers with any published score.
    pub fn scored_count(&self) -> usize {
        self.tested_providers.len() + self.untested_providers.len()
    }
}
