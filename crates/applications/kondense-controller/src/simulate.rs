//! Simulated scheduler adapter
//!
//! Bridges the decision engine to the external scheduling simulator. The
//! adapter owns the snapshot surgery: candidates out, departing nodes
//! excluded from targets, displaced and pending pods unbound for replay. It
//! also owns the one rule the raw simulator cannot express: a command that
//! only works by leaning on in-flight (non-initialized) capacity is not a
//! command.

use std::collections::HashSet;

use kondense_core::{
    ClusterSnapshot, NodeId, NodeView, PodId, PodView, Requirements, Result, SchedulingSimulator,
    SimulationInput,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candidates::{Candidate, Catalogs};

/// What a removal simulation concluded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SimulationOutcome {
    /// Every displaced and pending pod lands; `new_nodes` is the minimum
    /// replacement set (possibly empty)
    Schedulable { new_nodes: Vec<Requirements> },

    /// Some pods have no legal placement
    Unschedulable { reasons: Vec<(PodId, String)> },

    /// Pods would only fit on a non-initialized existing node
    AgainstUninitialized,
}

/// Simulate removing `remove` from the snapshot and replaying scheduling for
/// their displaced pods plus everything currently pending.
pub fn simulate_removal(
    snapshot: &ClusterSnapshot,
    remove: &[&Candidate],
    catalogs: &Catalogs,
    simulator: &dyn SchedulingSimulator,
) -> Result<SimulationOutcome> {
    let removed: HashSet<&NodeId> = remove.iter().map(|c| &c.node.id).collect();

    // Placement targets: initialized survivors that are not departing
    let targets: Vec<NodeView> = snapshot
        .nodes
        .iter()
        .filter(|n| n.initialized && !n.marked_for_deletion && !removed.contains(&n.id))
        .cloned()
        .collect();
    let target_ids: HashSet<&NodeId> = targets.iter().map(|n| &n.id).collect();

    let mut pods: Vec<PodView> = remove.iter().flat_map(|c| c.displaced_pods()).collect();
    pods.extend(snapshot.pending_pods().into_iter().cloned().map(|mut p| {
        p.bound_node = None;
        p
    }));

    let resident: Vec<PodView> = snapshot
        .pods
        .iter()
        .filter(|p| {
            p.bound_node
                .as_ref()
                .is_some_and(|n| target_ids.contains(n))
        })
        .cloned()
        .collect();

    let input = SimulationInput {
        nodes: targets,
        resident,
        pods: pods.clone(),
        pools: snapshot.pools.clone(),
        catalogs: catalogs.healthy_map(),
    };
    let result = simulator.simulate(&input)?;

    if result.all_scheduled() {
        debug!(
            removed = remove.len(),
            new_nodes = result.new_nodes.len(),
            "removal simulation schedulable"
        );
        return Ok(SimulationOutcome::Schedulable {
            new_nodes: result.new_nodes,
        });
    }

    // In-flight capacity check: an unschedulable pod that would fit on a
    // surviving non-initialized node means the command only works by
    // chaining through capacity that is not ready yet.
    let in_flight: Vec<&NodeView> = snapshot
        .nodes
        .iter()
        .filter(|n| !n.initialized && !n.marked_for_deletion && !removed.contains(&n.id))
        .collect();
    for (pod_id, _) in &result.unschedulable {
        let Some(pod) = pods.iter().find(|p| &p.id == pod_id) else {
            continue;
        };
        if in_flight
            .iter()
            .any(|node| would_fit(pod, node, snapshot))
        {
            return Ok(SimulationOutcome::AgainstUninitialized);
        }
    }

    Ok(SimulationOutcome::Unschedulable {
        reasons: result.unschedulable,
    })
}

/// Conservative fit check against a single in-flight node: requirements
/// permit it and its free capacity covers the pod
fn would_fit(pod: &PodView, node: &NodeView, snapshot: &ClusterSnapshot) -> bool {
    if !pod.requirements.permits_node(node) {
        return false;
    }
    let used = snapshot
        .pods_on(&node.id)
        .iter()
        .fold(kondense_core::ResourceVector::default(), |acc, p| {
            acc.add(&p.requests)
        });
    let free = node.allocatable.saturating_sub(&used);
    pod.requests.fits(&free)
}
