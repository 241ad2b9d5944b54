//! Shared consolidation decision kernel
//!
//! Single-node and multi-node consolidation differ only in how they choose a
//! candidate set; the judgement of a set is identical and lives here:
//!
//! ```text
//! simulate removal
//!     ├── pods stranded            → reject (event per candidate)
//!     ├── leans on in-flight node  → reject (event per candidate)
//!     ├── 0 replacements           → delete
//!     ├── 1 replacement            → price-filter types → replace | reject
//!     └── ≥2 replacements         → reject (a consolidation never widens)
//! ```
//!
//! The price filter is the safety core. A replacement claim is a set of
//! permitted instance types and the executor may bind any of them, so the
//! comparison uses each type's worst-case available offering price within
//! the claim. A type survives only if that worst case is strictly below the
//! candidates' combined price, and never at the same type as a deleted
//! candidate without strict improvement.

use kondense_core::{
    Clock, ClusterSnapshot, Command, ConsolidationMethod, DisruptionEvent, EventRecorder,
    NodeClaim, NodeId, Requirements, Result, SchedulingSimulator, REASON_NO_CHEAPER_REPLACEMENT,
    REASON_PODS_WOULD_NOT_SCHEDULE, REASON_UNINITIALIZED_TARGET,
};
use tracing::debug;

use crate::candidates::{Candidate, Catalogs};
use crate::simulate::{simulate_removal, SimulationOutcome};

/// Borrowed view of everything a decision needs; cheap to copy, so callers
/// can re-wrap it (e.g. with a muted recorder) without ceremony
#[derive(Clone, Copy)]
pub struct EngineContext<'a> {
    pub snapshot: &'a ClusterSnapshot,
    pub catalogs: &'a Catalogs,
    pub simulator: &'a dyn SchedulingSimulator,
    pub recorder: &'a dyn EventRecorder,
    pub clock: &'a dyn Clock,
}

/// Judge one candidate set: simulate its removal and derive the command, if
/// any. Rejections that stem from simulation emit an event on every
/// candidate in the set.
pub fn compute_command(
    ctx: &EngineContext<'_>,
    candidates: &[&Candidate],
    method: ConsolidationMethod,
) -> Result<Option<Command>> {
    if candidates.is_empty() {
        return Ok(None);
    }

    let outcome = simulate_removal(ctx.snapshot, candidates, ctx.catalogs, ctx.simulator)?;
    match outcome {
        SimulationOutcome::Unschedulable { .. } => {
            record_each(ctx, candidates, REASON_PODS_WOULD_NOT_SCHEDULE);
            Ok(None)
        }
        SimulationOutcome::AgainstUninitialized => {
            record_each(ctx, candidates, REASON_UNINITIALIZED_TARGET);
            Ok(None)
        }
        SimulationOutcome::Schedulable { new_nodes } => match new_nodes.len() {
            0 => Ok(Some(Command::delete(candidate_ids(candidates), method))),
            1 => Ok(build_replacement(ctx, candidates, &new_nodes[0], method)),
            fan_out => {
                // Deleting N nodes must never require more than one launch
                debug!(fan_out, "consolidation would widen, rejecting");
                Ok(None)
            }
        },
    }
}

/// Apply the price and same-type filters to the simulator's requirement set
/// and build the replace command if anything survives.
fn build_replacement(
    ctx: &EngineContext<'_>,
    candidates: &[&Candidate],
    required: &Requirements,
    method: ConsolidationMethod,
) -> Option<Command> {
    let combined_price: f64 = candidates.iter().map(|c| c.price).sum();

    // The simulator names the pools the claim may launch under; an
    // unconstrained dimension falls back to the candidates' own pools.
    let pools: Vec<&str> = if required.node_pools.is_empty() {
        let mut pools: Vec<&str> = candidates.iter().map(|c| c.pool.name.as_str()).collect();
        pools.sort_unstable();
        pools.dedup();
        pools
    } else {
        required.node_pools.iter().map(String::as_str).collect()
    };

    let mut kept: Vec<String> = Vec::new();
    for pool in pools {
        let Some(catalog) = ctx.catalogs.healthy(pool) else {
            continue;
        };
        for ty in catalog {
            if !required.instance_types.is_empty() && !required.instance_types.contains(&ty.name) {
                continue;
            }
            // A type the executor could not launch within the claim is not a
            // permitted option at all
            let Some(worst_case) = ty.worst_case_available(required) else {
                continue;
            };
            // Strict improvement against the whole candidate set
            if worst_case >= combined_price {
                continue;
            }
            // Never delete A to launch A' for no gain: against the cheapest
            // deleted candidate of the same type
            let same_type_floor = candidates
                .iter()
                .filter(|c| c.instance_type.name == ty.name)
                .map(|c| c.price)
                .min_by(f64::total_cmp);
            if let Some(floor) = same_type_floor {
                if worst_case >= floor {
                    continue;
                }
            }
            if !kept.contains(&ty.name) {
                kept.push(ty.name.clone());
            }
        }
    }

    if kept.is_empty() {
        record_each(ctx, candidates, REASON_NO_CHEAPER_REPLACEMENT);
        return None;
    }

    let claim = NodeClaim::new(Requirements {
        instance_types: kept.into_iter().collect(),
        ..required.clone()
    });
    Some(Command::replace(
        candidate_ids(candidates),
        vec![claim],
        method,
    ))
}

fn candidate_ids(candidates: &[&Candidate]) -> Vec<NodeId> {
    candidates.iter().map(|c| c.node.id.clone()).collect()
}

fn record_each(ctx: &EngineContext<'_>, candidates: &[&Candidate], reason: &str) {
    for candidate in candidates {
        ctx.recorder
            .record(DisruptionEvent::unconsolidatable(&candidate.node.id, reason));
    }
}
