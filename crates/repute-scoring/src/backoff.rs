//! Exponential backoff gate for providers with consecutive task failures.
//!
//! Only a provider whose most recent outcome is a failure is a candidate. The
//! trailing run of failures inside the lookback window, capped at
//! `max_failures`, sets the cooldown `base_hours * 2^(n - 1)` measured from
//! the latest failure. A success ends the run, so the gate opens as soon as
//! the provider completes a task.

use chrono::{DateTime, Utc};
use repute_core::constants::{
    DEFAULT_BACKOFF_BASE_HOURS, DEFAULT_BACKOFF_LOOKBACK_DAYS, DEFAULT_BACKOFF_MAX_FAILURES,
    SECS_PER_DAY, SECS_PER_HOUR,
};
use repute_core::types::{BlacklistEntry, NodeId, TaskOutcome, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tunables for the backoff gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffParams {
    /// Cooldown after a single failure.
    pub base_hours: i64,
    /// Failure count beyond which the cooldown stops growing.
    pub max_failures: u32,
    /// Failures older than this are not counted.
    pub lookback_days: i64,
}

impl Default for BackoffParams {
    fn default() -> Self {
        Self {
            base_hours: DEFAULT_BACKOFF_BASE_HOURS,
            max_failures: DEFAULT_BACKOFF_MAX_FAILURES,
            lookback_days: DEFAULT_BACKOFF_LOOKBACK_DAYS,
        }
    }
}

/// Cooldown in hours for `failures` consecutive failures.
///
/// # Examples
///
/// ```
/// use repute_scoring::backoff::{BackoffParams, backoff_hours};
///
/// let p = BackoffParams::default();
/// let hours: Vec<i64> = (0..=8).map(|n| backoff_hours(n, &p)).collect();
/// assert_eq!(hours, vec![0, 10, 20, 40, 80, 160, 320, 320, 320]);
/// ```
pub fn backoff_hours(failures: u32, params: &BackoffParams) -> i64 {
    if failures == 0 {
        return 0;
    }
    let effective = failures.min(params.max_failures.max(1));
    params.base_hours.saturating_mul(1i64 << (effective - 1).min(62))
}

/// Outcome of evaluating one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffDecision {
    pub eligible: bool,
    pub consecutive_failures: u32,
    pub next_eligible: Option<Timestamp>,
    /// Set when the provider is blacklisted.
    pub reason: Option<String>,
}

impl BackoffDecision {
    fn eligible() -> Self {
        Self {
            eligible: true,
            consecutive_failures: 0,
            next_eligible: None,
            reason: None,
        }
    }

    /// Blacklist entry for an ineligible provider.
    pub fn into_entry(self, provider: NodeId, created_at: Timestamp) -> Option<BlacklistEntry> {
        if self.eligible {
            return None;
        }
        let reason = self.reason?;
        Some(BlacklistEntry::provider(provider, reason, created_at))
    }
}

fn format_ts(ts: Timestamp) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0).map_or_else(|| ts.to_string(), |dt| dt.to_rfc3339())
}

/// Decide whether `provider` is currently backed off.
///
/// `outcomes` must be ascending by timestamp; outcomes of other providers are
/// skipped.
pub fn evaluate_provider_backoff(
    provider: &NodeId,
    outcomes: &[TaskOutcome],
    now: Timestamp,
    params: &BackoffParams,
) -> BackoffDecision {
    let cutoff = now - params.lookback_days * SECS_PER_DAY;
    let mine = || outcomes.iter().rev().filter(|o| &o.provider == provider);

    let Some(latest) = mine().next() else {
        return BackoffDecision::eligible();
    };
    if latest.success {
        return BackoffDecision::eligible();
    }

    let failures = mine()
        .take_while(|o| !o.success && o.timestamp >= cutoff)
        .count();
    let failures = u32::try_from(failures).unwrap_or(u32::MAX);
    if failures == 0 {
        return BackoffDecision::eligible();
    }

    let hours = backoff_hours(failures, params);
    let next = latest.timestamp.saturating_add(hours.saturating_mul(SECS_PER_HOUR));
    if now >= next {
        return BackoffDecision {
            eligible: true,
            consecutive_failures: failures,
            next_eligible: Some(next),
            reason: None,
        };
    }

    debug!(%provider, failures, hours, next, "backoff: provider gated");
    BackoffDecision {
        eligible: false,
        consecutive_failures: failures,
        next_eligible: Some(next),
        reason: Some(format!(
            "Consecutive failures: {failures}. Next eligible date: {}",
            format_ts(next)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        NodeId::parse("0x00000000000000000000000000000000000000cc").unwrap()
    }

    fn outcome(success: bool, ts: Timestamp) -> TaskOutcome {
        TaskOutcome {
            provider: node(),
            task_id: ts as u64,
            success,
            error: (!success).then(|| "timeout".to_string()),
            cost: None,
            timestamp: ts,
        }
    }

    const T: Timestamp = 1_700_000_000;

    #[test]
    fn three_failures_gate_for_forty_hours() {
        let history = [outcome(false, T - 200), outcome(false, T - 100), outcome(false, T)];
        let p = BackoffParams::default();
        let d = evaluate_provider_backoff(&node(), &history, T + 1, &p);
        assert!(!d.eligible);
        assert_eq!(d.consecutive_failures, 3);
        assert_eq!(d.next_eligible, Some(T + 40 * SECS_PER_HOUR));
        assert!(d.reason.as_deref().unwrap().starts_with("Consecutive failures: 3."));

        let later = evaluate_provider_backoff(&node(), &history, T + 40 * SECS_PER_HOUR, &p);
        assert!(later.eligible);
    }

    #[test]
    fn success_opens_the_gate() {
        let history = [outcome(false, T - 20), outcome(false, T - 10), outcome(true, T)];
        let d = evaluate_provider_backoff(&node(), &history, T + 1, &BackoffParams::default());
        assert_eq!(d, BackoffDecision::eligible());
    }

    #[test]
    fn success_breaks_the_run() {
        let history = [
            outcome(false, T - 30),
            outcome(true, T - 20),
            outcome(false, T - 10),
        ];
        let d = evaluate_provider_backoff(&node(), &history, T, &BackoffParams::default());
        assert_eq!(d.consecutive_failures, 1);
        assert_eq!(d.next_eligible, Some(T - 10 + 10 * SECS_PER_HOUR));
    }

    #[test]
    fn failures_outside_lookback_are_not_counted() {
        let old = T - 4 * SECS_PER_DAY;
        let history = [outcome(false, old), outcome(false, T)];
        let d = evaluate_provider_backoff(&node(), &history, T, &BackoffParams::default());
        assert_eq!(d.consecutive_failures, 1);
    }

    #[test]
    fn no_outcomes_is_eligible() {
        let d = evaluate_provider_backoff(&node(), &[], T, &BackoffParams::default());
        assert!(d.eligible);
        assert!(d.into_entry(node(), T).is_none());
    }

    #[test]
    fn gated_decision_becomes_entry() {
        let d = evaluate_provider_backoff(&node(), &[outcome(false, T)], T, &BackoffParams::default());
        let entry = d.into_entry(node(), T).unwrap();
        assert!(entry.reason.contains("2023-11-15T08:13:20+00:00"));
    }
}
