//! Disruption-cost model
//!
//! Lower cost means "prefer to disrupt". The score combines what lives on
//! the node with how much lifetime the node has left:
//!
//! ```text
//! cost = Σ pod_cost(p) × lifetime_multiplier(node)
//! ```
//!
//! The multiplier approaches 0 as a node nears its pool's `expire_after`, so
//! a busy node about to be recycled anyway beats an idle long-lived one.

use chrono::{DateTime, Utc};
use kondense_core::{NodePool, NodeView, PodView};

/// Ownership term for a pod with no controller: losing it loses work nothing
/// will recreate
pub const BARE_POD_COST: f64 = 10.0;

/// Ownership term for a controller-owned pod
const CONTROLLER_OWNED_POD_COST: f64 = 1.0;

/// Cost contribution of one resident pod: ownership term plus one per pod
pub fn pod_cost(pod: &PodView) -> f64 {
    let ownership = if pod.controller_owned {
        CONTROLLER_OWNED_POD_COST
    } else {
        BARE_POD_COST
    };
    ownership + 1.0
}

/// Remaining lifetime fraction under the pool's expiry, clamped to [0, 1].
/// Pools without an expiry never discount.
pub fn lifetime_multiplier(node: &NodeView, pool: Option<&NodePool>, now: DateTime<Utc>) -> f64 {
    let Some(expire_after) = pool.and_then(|p| p.expire_after) else {
        return 1.0;
    };
    if expire_after.is_zero() {
        return 0.0;
    }
    let age = (now - node.created).to_std().unwrap_or_default();
    let remaining = 1.0 - age.as_secs_f64() / expire_after.as_secs_f64();
    remaining.clamp(0.0, 1.0)
}

/// Disruption cost of a node given its resident pods. Daemon pods ride along
/// with the node and do not count.
pub fn disruption_cost(
    node: &NodeView,
    pods: &[PodView],
    pool: Option<&NodePool>,
    now: DateTime<Utc>,
) -> f64 {
    let pod_sum: f64 = pods.iter().filter(|p| !p.daemon).map(pod_cost).sum();
    pod_sum * lifetime_multiplier(node, pool, now)
}
