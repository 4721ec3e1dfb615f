//! Interval reconstruction: uptime from discrete liveness observations.
//!
//! The walk keeps at most one open online interval. An online observation
//! opens it (repeats are idempotent), an offline observation closes it, and an
//! interval still open at the end is closed at `now`. The ratio's denominator
//! is the time since the provider was first seen.
//!
//! Input must be ascending by timestamp; the reconstructor does not re-sort.

use repute_core::types::{LivenessObservation, NodeId, Timestamp};
use tracing::trace;

/// Total online seconds within `[first_seen, now]`.
///
/// Observation timestamps are clamped into that range so a ratio built from
/// the result never leaves `[0, 1]`.
pub fn online_seconds(
    node: &NodeId,
    observations: &[LivenessObservation],
    first_seen: Timestamp,
    now: Timestamp,
) -> i64 {
    let clamp = |ts: Timestamp| ts.clamp(first_seen, now.max(first_seen));

    let mut online = 0i64;
    let mut last_online: Option<Timestamp> = None;

    for obs in observations.iter().filter(|o| &o.node_id == node) {
        let ts = clamp(obs.timestamp);
        match (obs.online, last_online) {
            (true, None) => last_online = Some(ts),
            (true, Some(_)) => {}
            (false, Some(start)) => {
                online += ts - start;
                last_online = None;
            }
            (false, None) => {}
        }
    }

    if let Some(start) = last_online {
        online += clamp(now) - start;
    }
    online
}

/// Uptime ratio of `node` in `[0, 1]`.
///
/// Returns `None` when there are no observations for the node, and `Some(0.0)`
/// when no time has elapsed since `first_seen`.
///
/// # Examples
///
/// ```
/// use repute_core::types::{LivenessObservation, NodeId};
/// use repute_scoring::uptime::reconstruct_uptime;
///
/// let node = NodeId::parse("0x0000000000000000000000000000000000000001").unwrap();
/// let obs = |online, timestamp| LivenessObservation { node_id: node.clone(), online, timestamp };
///
/// // online [0,10), offline [10,20), online again from 20, now = 30
/// let history = vec![obs(true, 0), obs(false, 10), obs(true, 20)];
/// let ratio = reconstruct_uptime(&node, &history, 0, 30).unwrap();
/// assert!((ratio - 20.0 / 30.0).abs() < 1e-12);
///
/// assert_eq!(reconstruct_uptime(&node, &[], 0, 30), None);
/// ```
pub fn reconstruct_uptime(
    node: &NodeId,
    observations: &[LivenessObservation],
    first_seen: Timestamp,
    now: Timestamp,
) -> Option<f64> {
    if !observations.iter().any(|o| &o.node_id == node) {
        return None;
    }

    let elapsed = now - first_seen;
    if elapsed <= 0 {
        return Some(0.0);
    }

    let online = online_seconds(node, observations, first_seen, now);
    let ratio = online as f64 / elapsed as f64;
    trace!(%node, online, elapsed, ratio, "uptime: reconstructed");
    Some(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        NodeId::parse("0x00000000000000000000000000000000000000aa").unwrap()
    }

    fn obs(online: bool, ts: Timestamp) -> LivenessObservation {
        LivenessObservation {
            node_id: node(),
            online,
            timestamp: ts,
        }
    }

    #[test]
    fn single_online_observation_is_full_uptime() {
        let t = 1_700_000_000;
        let ratio = reconstruct_uptime(&node(), &[obs(true, t)], t, t + 100).unwrap();
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn zero_elapsed_is_zero_not_nan() {
        assert_eq!(reconstruct_uptime(&node(), &[obs(true, 50)], 50, 50), Some(0.0));
    }

    #[test]
    fn duplicate_online_does_not_restart_interval() {
        let deduped = [obs(true, 0), obs(false, 10)];
        let repeated = [obs(true, 0), obs(true, 5), obs(false, 10)];
        assert_eq!(
            reconstruct_uptime(&node(), &deduped, 0, 20),
            reconstruct_uptime(&node(), &repeated, 0, 20)
        );
    }

    #[test]
    fn leading_offline_is_ignored() {
        let ratio = reconstruct_uptime(&node(), &[obs(false, 0), obs(true, 50)], 0, 100).unwrap();
        assert_eq!(ratio, 0.5);
    }

    #[test]
    fn currently_offline_counts_only_closed_intervals() {
        let ratio = reconstruct_uptime(&node(), &[obs(true, 0), obs(false, 25)], 0, 100).unwrap();
        assert_eq!(ratio, 0.25);
    }

    #[test]
    fn observations_of_other_nodes_are_skipped() {
        let other = LivenessObservation {
            node_id: NodeId::parse("0x00000000000000000000000000000000000000bb").unwrap(),
            online: false,
            timestamp: 10,
        };
        let ratio = reconstruct_uptime(&node(), &[obs(true, 0), other], 0, 100).unwrap();
        assert_eq!(ratio, 1.0);
        assert_eq!(reconstruct_uptime(&node(), &[obs(true, 0)][..0], 0, 100), None);
    }

    #[test]
    fn observations_before_first_seen_are_clamped() {
        let ratio = reconstruct_uptime(&node(), &[obs(true, -500)], 0, 100).unwrap();
        assert_eq!(ratio, 1.0);
    }
}
