//! Operator anomaly detection.
//!
//! Two independent checks run over the same evidence and their findings are
//! merged per wallet:
//!
//! 1. **Success ratio.** Task outcomes are grouped by the provider's operator
//!    wallet. Wallets with fewer than `min_tasks` outcomes are dropped before
//!    the population mean and (population) standard deviation are computed.
//!    A wallet whose z-score is at or below `z_score_threshold` is flagged.
//! 2. **CPU variance.** Only wallets with at least `min_online_providers`
//!    online providers are examined. A wallet is flagged when any of its
//!    providers has a coefficient of variation above
//!    `cpu_deviation_threshold` in either CPU category.
//!
//! A degenerate population (no spread, no positive mean) flags nobody.
//! Output is sorted by wallet so repeated runs over the same evidence are
//! byte-identical.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use repute_core::constants::{
    DEFAULT_CPU_DEVIATION_THRESHOLD, DEFAULT_CPU_WINDOW_DAYS, DEFAULT_MIN_ONLINE_PROVIDERS,
    DEFAULT_MIN_OPERATOR_TASKS, DEFAULT_SUCCESS_WINDOW_DAYS, DEFAULT_Z_SCORE_THRESHOLD, SECS_PER_DAY,
};
use repute_core::types::{
    BenchmarkCategory, BenchmarkSample, BlacklistEntry, NodeId, TaskOutcome, Timestamp,
    WalletAddress,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stats::{coefficient_of_variation, mean, population_stddev, z_score};

/// Tunables for operator anomaly detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyParams {
    /// Outcomes older than this do not count toward success ratios.
    pub success_window_days: i64,
    /// Wallets with fewer outcomes are statistically insufficient.
    pub min_tasks: usize,
    pub z_score_threshold: f64,
    /// CPU samples older than this do not count toward variance.
    pub cpu_window_days: i64,
    pub cpu_deviation_threshold: f64,
    /// Wallets with fewer online providers skip the CPU check.
    pub min_online_providers: usize,
}

impl Default for AnomalyParams {
    fn default() -> Self {
        Self {
            success_window_days: DEFAULT_SUCCESS_WINDOW_DAYS,
            min_tasks: DEFAULT_MIN_OPERATOR_TASKS,
            z_score_threshold: DEFAULT_Z_SCORE_THRESHOLD,
            cpu_window_days: DEFAULT_CPU_WINDOW_DAYS,
            cpu_deviation_threshold: DEFAULT_CPU_DEVIATION_THRESHOLD,
            min_online_providers: DEFAULT_MIN_ONLINE_PROVIDERS,
        }
    }
}

impl AnomalyParams {
    pub fn success_cutoff(&self, now: Timestamp) -> Timestamp {
        now - self.success_window_days * SECS_PER_DAY
    }

    pub fn cpu_cutoff(&self, now: Timestamp) -> Timestamp {
        now - self.cpu_window_days * SECS_PER_DAY
    }
}

/// Facts the detector works from. The caller applies the time windows.
#[derive(Debug, Clone, Copy)]
pub struct OperatorEvidence<'a> {
    /// Task outcomes within the success window.
    pub outcomes: &'a [TaskOutcome],
    /// CPU benchmark samples within the CPU window.
    pub cpu_samples: &'a [BenchmarkSample],
    /// Operator wallet of each known provider.
    pub operators: &'a HashMap<NodeId, WalletAddress>,
    /// Providers currently online.
    pub online: &'a HashSet<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnomalyKind {
    SuccessRatio,
    CpuVariance,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SuccessRatio => "success-ratio",
            Self::CpuVariance => "cpu-variance",
        })
    }
}

/// A wallet flagged by one or both checks.
#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedOperator {
    pub wallet: WalletAddress,
    /// Findings joined with `"; "`.
    pub reason: String,
    pub kinds: Vec<AnomalyKind>,
}

impl FlaggedOperator {
    pub fn into_entry(self, created_at: Timestamp) -> BlacklistEntry {
        BlacklistEntry::operator(self.wallet, self.reason, created_at)
    }
}

// ---------------------------------------------------------------------------
// Success ratio
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    success: usize,
    total: usize,
}

impl Tally {
    fn ratio(&self) -> f64 {
        self.success as f64 / self.total as f64
    }
}

fn success_ratio_findings(
    evidence: &OperatorEvidence<'_>,
    params: &AnomalyParams,
) -> Vec<(WalletAddress, String)> {
    let mut tallies: HashMap<&WalletAddress, Tally> = HashMap::new();
    for outcome in evidence.outcomes {
        let Some(wallet) = evidence.operators.get(&outcome.provider) else {
            continue;
        };
        let t = tallies.entry(wallet).or_default();
        t.total += 1;
        if outcome.success {
            t.success += 1;
        }
    }

    let eligible: Vec<(&WalletAddress, f64)> = tallies
        .into_iter()
        .filter(|(_, t)| t.total >= params.min_tasks.max(1))
        .map(|(w, t)| (w, t.ratio()))
        .collect();
    let ratios: Vec<f64> = eligible.iter().map(|(_, r)| *r).collect();

    let (Some(avg), Some(sd)) = (mean(&ratios), population_stddev(&ratios)) else {
        return Vec::new();
    };
    debug!(wallets = ratios.len(), mean = avg, stddev = sd, "anomaly: success ratio population");

    eligible
        .into_iter()
        .filter_map(|(wallet, ratio)| {
            let z = z_score(ratio, avg, sd)?;
            (z <= params.z_score_threshold).then(|| {
                let reason = format!(
                    "Task success ratio deviation: ratio={ratio:.2}, z-score={z:.2} at or below {:.2}. \
                     Operator has significantly lower success ratio than the average.",
                    params.z_score_threshold
                );
                (wallet.clone(), reason)
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CPU variance
// ---------------------------------------------------------------------------

fn fmt_deviation(d: Option<f64>) -> String {
    d.map_or_else(|| "n/a".to_string(), |d| format!("{d:.2}"))
}

fn cpu_variance_findings(
    evidence: &OperatorEvidence<'_>,
    params: &AnomalyParams,
) -> Vec<(WalletAddress, String)> {
    let mut online_per_wallet: HashMap<&WalletAddress, usize> = HashMap::new();
    for node in evidence.online {
        if let Some(wallet) = evidence.operators.get(node) {
            *online_per_wallet.entry(wallet).or_default() += 1;
        }
    }

    // provider -> (multi values, single values), only for eligible wallets
    let mut per_provider: BTreeMap<&NodeId, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for s in evidence.cpu_samples {
        let Some(wallet) = evidence.operators.get(&s.provider) else {
            continue;
        };
        if online_per_wallet.get(wallet).copied().unwrap_or(0) < params.min_online_providers {
            continue;
        }
        let entry = per_provider.entry(&s.provider).or_default();
        match s.category {
            BenchmarkCategory::CpuMulti => entry.0.push(s.value),
            BenchmarkCategory::CpuSingle => entry.1.push(s.value),
            _ => {}
        }
    }

    let mut findings = Vec::new();
    for (provider, (multi, single)) in per_provider {
        let multi_dev = coefficient_of_variation(&multi);
        let single_dev = coefficient_of_variation(&single);
        let over = |d: Option<f64>| d.is_some_and(|d| d > params.cpu_deviation_threshold);
        if !(over(multi_dev) || over(single_dev)) {
            continue;
        }
        let Some(wallet) = evidence.operators.get(provider) else {
            continue;
        };
        debug!(%provider, %wallet, ?multi_dev, ?single_dev, "anomaly: cpu variance");
        let reason = format!(
            "CPU benchmark deviation on provider {provider}: multi={}, single={} over threshold {:.2}. \
             Possibly overprovisioned CPU.",
            fmt_deviation(multi_dev),
            fmt_deviation(single_dev),
            params.cpu_deviation_threshold
        );
        findings.push((wallet.clone(), reason));
    }
    findings
}

/// Operators whose success ratio or CPU consistency is a population outlier.
///
/// The result is the complete flagged set for this evidence: a wallet absent
/// from it should not remain blacklisted.
pub fn detect_blacklisted_operators(
    evidence: &OperatorEvidence<'_>,
    params: &AnomalyParams,
) -> Vec<FlaggedOperator> {
    let mut merged: BTreeMap<WalletAddress, (Vec<String>, Vec<AnomalyKind>)> = BTreeMap::new();

    for (wallet, reason) in success_ratio_findings(evidence, params) {
        let e = merged.entry(wallet).or_default();
        e.0.push(reason);
        e.1.push(AnomalyKind::SuccessRatio);
    }
    for (wallet, reason) in cpu_variance_findings(evidence, params) {
        let e = merged.entry(wallet).or_default();
        e.0.push(reason);
        if !e.1.contains(&AnomalyKind::CpuVariance) {
            e.1.push(AnomalyKind::CpuVariance);
        }
    }

    merged
        .into_iter()
        .map(|(wallet, (reasons, kinds))| FlaggedOperator {
            wallet,
            reason: reasons.join("; "),
            kinds,
        })
        .collect()
}
