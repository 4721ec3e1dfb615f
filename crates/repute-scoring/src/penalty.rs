//! Deviation penalty for headline CPU scores.
//!
//! A provider's latest CPU result is compared with the mean of its own last
//! few results. The relative deviation picks a fixed multiplicative weight
//! applied to `latest / population_max`.

use std::collections::HashMap;

use repute_core::constants::MIN_PENALTY_HISTORY;
use repute_core::types::{BenchmarkCategory, BenchmarkSample, NodeId};
use tracing::debug;

use crate::stats::mean;

/// Deviation at or below this percentage carries no penalty.
pub const NO_PENALTY_MAX_PCT: f64 = 5.0;

/// Deviation at or below this percentage carries the mild penalty.
pub const MILD_PENALTY_MAX_PCT: f64 = 15.0;

pub const MILD_PENALTY_WEIGHT: f64 = 0.7;
pub const SEVERE_PENALTY_WEIGHT: f64 = 0.4;

/// Weight for a deviation given in percent.
///
/// # Examples
///
/// ```
/// use repute_scoring::penalty::penalty_weight;
///
/// assert_eq!(penalty_weight(5.0), 1.0);
/// assert_eq!(penalty_weight(5.01), 0.7);
/// assert_eq!(penalty_weight(15.0), 0.7);
/// assert_eq!(penalty_weight(40.0), 0.4);
/// ```
pub fn penalty_weight(deviation_pct: f64) -> f64 {
    if deviation_pct <= NO_PENALTY_MAX_PCT {
        1.0
    } else if deviation_pct <= MILD_PENALTY_MAX_PCT {
        MILD_PENALTY_WEIGHT
    } else {
        SEVERE_PENALTY_WEIGHT
    }
}

/// `|latest - mean| / mean * 100`, or `None` without enough history.
pub fn deviation_pct(latest: f64, recent_history: &[f64]) -> Option<f64> {
    if recent_history.len() < MIN_PENALTY_HISTORY {
        return None;
    }
    let m = mean(recent_history)?;
    if m <= 0.0 {
        return None;
    }
    Some((latest - m).abs() / m * 100.0)
}

/// Penalised CPU score `latest / population_max * weight`.
///
/// `recent_history` is the provider's own latest samples, newest included.
/// Too little history means no penalty. `None` when `population_max` is not
/// a positive number.
pub fn penalize_cpu_score(
    provider: &NodeId,
    latest: f64,
    recent_history: &[f64],
    population_max: f64,
) -> Option<f64> {
    if !population_max.is_finite() || population_max <= 0.0 {
        return None;
    }
    let weight = deviation_pct(latest, recent_history).map_or(1.0, penalty_weight);
    if weight < 1.0 {
        debug!(%provider, latest, weight, "penalty: unstable cpu results");
    }
    Some(latest / population_max * weight)
}

/// Penalised scores for every provider with samples of a CPU `category`.
///
/// `samples` must be ascending by timestamp; the population maximum is taken
/// over all of them. Each provider's history is its last `history_len`
/// samples.
pub fn penalized_cpu_scores(
    category: BenchmarkCategory,
    samples: &[BenchmarkSample],
    history_len: usize,
) -> HashMap<NodeId, f64> {
    let mut per_provider: HashMap<&NodeId, Vec<f64>> = HashMap::new();
    let mut population_max = f64::NEG_INFINITY;
    for s in samples.iter().filter(|s| s.category == category) {
        population_max = population_max.max(s.value);
        per_provider.entry(&s.provider).or_default().push(s.value);
    }

    per_provider
        .into_iter()
        .filter_map(|(provider, values)| {
            let history = &values[values.len().saturating_sub(history_len.max(1))..];
            let latest = *history.last()?;
            let score = penalize_cpu_score(provider, latest, history, population_max)?;
            Some((provider.clone(), score))
        })
        .collect()
}
