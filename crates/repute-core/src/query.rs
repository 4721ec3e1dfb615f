//! Read-side queries answered from published state.
//!
//! [`ProviderFilter`] selects providers out of a [`ProviderScoreSnapshot`],
//! which already excludes offline and rejected providers. Bounds use the
//! snapshot's own units: uptime and success rate are ratios in `[0, 1]`, CPU
//! scores are penalised population-relative scores.

use serde::{Deserialize, Serialize};

use crate::constants::SECS_PER_DAY;
use crate::snapshot::{ProviderRef, ProviderScoreSnapshot};
use crate::types::{BlacklistEntry, BlacklistSubject, NodeId, Provider, Timestamp};

/// Optional inclusive bounds on published scores.
///
/// A bound on a metric the provider has no value for excludes it, so any
/// score bound drops untested providers and providers without CPU results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderFilter {
    /// Minimum days since the provider was first seen.
    pub min_provider_age: Option<u32>,
    pub min_uptime: Option<f64>,
    pub max_uptime: Option<f64>,
    pub min_success_rate: Option<f64>,
    pub max_success_rate: Option<f64>,
    pub min_cpu_single_thread_score: Option<f64>,
    pub max_cpu_single_thread_score: Option<f64>,
    pub min_cpu_multi_thread_score: Option<f64>,
    pub max_cpu_multi_thread_score: Option<f64>,
}

/// `true` when `value` satisfies both bounds; a missing value fails any bound.
fn within(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(v) = value else {
        return false;
    };
    min.is_none_or(|m| v >= m) && max.is_none_or(|m| v <= m)
}

impl ProviderFilter {
    fn old_enough(&self, provider: &ProviderRef, now: Timestamp) -> bool {
        self.min_provider_age.is_none_or(|days| {
            provider.created_at <= now.saturating_sub(i64::from(days) * SECS_PER_DAY)
        })
    }

    fn tested_only(&self) -> bool {
        self.min_success_rate.is_some()
            || self.max_success_rate.is_some()
            || self.min_cpu_single_thread_score.is_some()
            || self.max_cpu_single_thread_score.is_some()
            || self.min_cpu_multi_thread_score.is_some()
            || self.max_cpu_multi_thread_score.is_some()
    }

    /// Ids of the providers in `snapshot` matching every bound, tested
    /// providers first, each group in snapshot order.
    pub fn apply(&self, snapshot: &ProviderScoreSnapshot, now: Timestamp) -> Vec<NodeId> {
        let tested = snapshot.tested_providers.iter().filter(|p| {
            let s = &p.scores;
            self.old_enough(&p.provider, now)
                && within(s.uptime, self.min_uptime, self.max_uptime)
                && within(Some(s.success_rate), self.min_success_rate, self.max_success_rate)
                && within(
                    s.cpu_single_thread_score,
                    self.min_cpu_single_thread_score,
                    self.max_cpu_single_thread_score,
                )
                && within(
                    s.cpu_multi_thread_score,
                    self.min_cpu_multi_thread_score,
                    self.max_cpu_multi_thread_score,
                )
        });
        let untested = snapshot
            .untested_providers
            .iter()
            .filter(|_| !self.tested_only())
            .filter(|p| {
                self.old_enough(&p.provider, now)
                    && within(p.scores.uptime, self.min_uptime, self.max_uptime)
            });

        tested
            .map(|p| p.provider.id.clone())
            .chain(untested.map(|p| p.provider.id.clone()))
            .collect()
    }
}

/// Whether a provider, or the operator wallet it is paid to, is blacklisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistStatus {
    pub node_id: NodeId,
    pub is_blacklisted_provider: bool,
    pub is_blacklisted_wallet: bool,
}

impl BlacklistStatus {
    /// Check `id` against the current blacklist sets.
    ///
    /// `provider` is the stored record for `id`, if any; without it there is
    /// no operator wallet to check.
    pub fn check(
        id: &NodeId,
        provider: Option<&Provider>,
        provider_blacklist: &[BlacklistEntry],
        operator_blacklist: &[BlacklistEntry],
    ) -> Self {
        let is_blacklisted_provider = provider_blacklist
            .iter()
            .any(|e| matches!(&e.subject, BlacklistSubject::Provider(p) if p == id));
        let is_blacklisted_wallet = provider
            .and_then(Provider::operator_wallet)
            .is_some_and(|wallet| {
                operator_blacklist
                    .iter()
                    .any(|e| matches!(&e.subject, BlacklistSubject::Operator(w) if w == wallet))
            });
        Self {
            node_id: id.clone(),
            is_blacklisted_provider,
            is_blacklisted_wallet,
        }
    }
}
