//! # repute-scoring: Reputation scoring engine.
//!
//! Pure computation over batches of facts read by the caller. No storage, no
//! IO, no state carried between calls.
//!
//! - **Interval reconstruction** ([`uptime`]): online/offline observations to
//!   an uptime ratio anchored at the provider's first-seen time.
//! - **Benchmark normalisation** ([`normalize`]): a provider's latest sample
//!   against the min/max of the population's most recent samples.
//! - **Deviation penalty** ([`penalty`]): CPU scores discounted when a
//!   provider's own recent results are unstable.
//! - **Operator anomalies** ([`anomaly`]): success-ratio z-scores and CPU
//!   coefficient of variation per payment wallet.
//! - **Backoff gate** ([`backoff`]): exponential cooldown after consecutive
//!   task failures.
//!
//! Missing or degenerate data yields `None` rather than zero.

pub mod anomaly;
pub mod backoff;
pub mod normalize;
pub mod penalty;
pub mod stats;
pub mod uptime;

pub use anomaly::{AnomalyKind, AnomalyParams, FlaggedOperator, OperatorEvidence, detect_blacklisted_operators};
pub use backoff::{BackoffDecision, BackoffParams, backoff_hours, evaluate_provider_backoff};
pub use normalize::{CategoryPopulation, NormalizeParams, normalize_benchmarks};
pub use penalty::{penalize_cpu_score, penalty_weight};
pub use uptime::reconstruct_uptime;
