//! Benchmark normalisation against the recent population.
//!
//! For one category the population is reduced to each provider's most recent
//! `recent_n` samples. The extremes of that reduced set anchor the score; the
//! scored value is the provider's single latest sample. Old outliers fall out
//! of the window instead of pinning the range forever.

use std::collections::HashMap;

use repute_core::constants::{DEFAULT_BENCHMARK_WINDOW_DAYS, DEFAULT_RECENT_N, SECS_PER_DAY};
use repute_core::types::{BenchmarkCategory, BenchmarkSample, Direction, NodeId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tunables for benchmark normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeParams {
    /// Samples kept per provider when computing the population range.
    pub recent_n: usize,
    /// Only samples this recent enter the population.
    pub benchmark_window_days: i64,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            recent_n: DEFAULT_RECENT_N,
            benchmark_window_days: DEFAULT_BENCHMARK_WINDOW_DAYS,
        }
    }
}

impl NormalizeParams {
    /// Earliest sample timestamp admitted at `now`.
    pub fn cutoff(&self, now: Timestamp) -> Timestamp {
        now - self.benchmark_window_days * SECS_PER_DAY
    }
}

/// The recent-N view of one category's population.
#[derive(Debug, Clone)]
pub struct CategoryPopulation {
    category: BenchmarkCategory,
    latest: HashMap<NodeId, f64>,
    min: Option<f64>,
    max: Option<f64>,
}

impl CategoryPopulation {
    /// Build the population view from samples of `category`.
    ///
    /// `samples` must be ascending by timestamp. Samples of other categories
    /// are ignored. A `recent_n` of zero is treated as one.
    pub fn from_samples(
        category: BenchmarkCategory,
        samples: &[BenchmarkSample],
        recent_n: usize,
    ) -> Self {
        let keep = recent_n.max(1);
        let mut per_provider: HashMap<&NodeId, Vec<f64>> = HashMap::new();
        for s in samples.iter().filter(|s| s.category == category) {
            per_provider.entry(&s.provider).or_default().push(s.value);
        }

        let mut latest = HashMap::with_capacity(per_provider.len());
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        for (provider, values) in per_provider {
            let recent = &values[values.len().saturating_sub(keep)..];
            for &v in recent {
                min = Some(min.map_or(v, |m| m.min(v)));
                max = Some(max.map_or(v, |m| m.max(v)));
            }
            if let Some(&last) = recent.last() {
                latest.insert(provider.clone(), last);
            }
        }

        Self {
            category,
            latest,
            min,
            max,
        }
    }

    pub fn category(&self) -> BenchmarkCategory {
        self.category
    }

    /// Lowest value in the recent window.
    pub fn min(&self) -> Option<f64> {
        self.min
    }

    /// Highest value in the recent window.
    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// A provider's latest sample, if it has one.
    pub fn latest(&self, provider: &NodeId) -> Option<f64> {
        self.latest.get(provider).copied()
    }

    pub fn provider_count(&self) -> usize {
        self.latest.len()
    }

    /// Score of `provider` in `[0, 1]`.
    ///
    /// `HigherIsBetter` scores `(v - min) / (max - min)`; `LowerIsBetter`
    /// anchors the good end at `min`, giving `(max - v) / (max - min)`.
    /// `None` when the provider has no sample or the population has no spread.
    pub fn score(&self, provider: &NodeId, direction: Direction) -> Option<f64> {
        let v = self.latest(provider)?;
        let (min, max) = (self.min?, self.max?);
        let spread = max - min;
        if spread.is_nan() || spread <= 0.0 {
            return None;
        }
        let raw = match direction {
            Direction::HigherIsBetter => (v - min) / spread,
            Direction::LowerIsBetter => (max - v) / spread,
        };
        Some(raw.clamp(0.0, 1.0))
    }
}

/// Normalised score of one provider in one category.
///
/// Convenience wrapper building a [`CategoryPopulation`] for a single lookup;
/// callers scoring many providers should build the population once.
///
/// # Examples
///
/// ```
/// use repute_core::types::{BenchmarkCategory, BenchmarkSample, Direction, NodeId};
/// use repute_scoring::normalize::normalize_benchmarks;
///
/// let a = NodeId::parse("0x000000000000000000000000000000000000000a").unwrap();
/// let b = NodeId::parse("0x000000000000000000000000000000000000000b").unwrap();
/// let cat = BenchmarkCategory::DiskSeqRead;
/// let samples = vec![
///     BenchmarkSample::new(a.clone(), cat, 100.0, 1).unwrap(),
///     BenchmarkSample::new(b.clone(), cat, 300.0, 2).unwrap(),
/// ];
///
/// assert_eq!(normalize_benchmarks(&a, cat, &samples, 3, Direction::HigherIsBetter), Some(0.0));
/// assert_eq!(normalize_benchmarks(&b, cat, &samples, 3, Direction::HigherIsBetter), Some(1.0));
/// assert_eq!(normalize_benchmarks(&a, cat, &samples, 3, Direction::LowerIsBetter), Some(1.0));
/// ```
pub fn normalize_benchmarks(
    provider: &NodeId,
    category: BenchmarkCategory,
    population_samples: &[BenchmarkSample],
    recent_n: usize,
    direction: Direction,
) -> Option<f64> {
    let population = CategoryPopulation::from_samples(category, population_samples, recent_n);
    let score = population.score(provider, direction);
    if score.is_none() {
        debug!(%provider, %category, providers = population.provider_count(), "normalize: no score");
    }
    score
}
