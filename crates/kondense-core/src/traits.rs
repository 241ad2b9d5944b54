//! Collaborator seams
//!
//! The decision engine works through these interfaces ONLY - never concrete
//! cloud, cluster or scheduler types. The engine owns no caches and no
//! executors; everything stateful lives behind one of these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::events::DisruptionEvent;
use crate::instance::InstanceType;
use crate::requirements::Requirements;
use crate::types::{DisruptionBudget, NodeId, NodePool, NodeView, PodId, PodView};

/// Read side of the cluster state cache plus the single sanctioned write
/// path (`mark_for_deletion`). Reads reflect the cache as of the last
/// refresh; the engine snapshots them once per reconcile.
pub trait ClusterState: Send + Sync {
    fn nodes(&self) -> Vec<NodeView>;
    fn pods(&self) -> Vec<PodView>;
    fn pending_pods(&self) -> Vec<PodView>;
    fn node_pools(&self) -> Vec<NodePool>;
    fn budgets(&self) -> Vec<DisruptionBudget>;

    /// Flag a node as departing so subsequent decisions treat its capacity
    /// as gone. Cleared only by the external refresh after the node
    /// actually disappears, or by `unmark_for_deletion` on rollback.
    fn mark_for_deletion(&self, node: &NodeId);
    fn unmark_for_deletion(&self, node: &NodeId);

    /// True once a node's nomination for pending pods has lapsed. Nodes
    /// holding a live nomination are reserved capacity, not candidates.
    fn nomination_expired(&self, node: &NodeId) -> bool;
}

/// Cloud-provider catalog access. An error marks the pool unhealthy for the
/// cycle; other pools proceed. The call inherits the caller's deadline.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn instance_types(&self, node_pool: &NodePool) -> Result<Vec<InstanceType>>;
}

/// Where a pod lands in a simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimTarget {
    /// An existing node that survives the command
    Existing(NodeId),
    /// The i-th synthetic node of `SimResult::new_nodes`
    New(usize),
}

/// Outcome of one scheduling replay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimResult {
    /// Pod placements onto surviving or synthetic nodes
    pub scheduled: Vec<(PodId, SimTarget)>,

    /// Pods with no legal placement, with reasons
    pub unschedulable: Vec<(PodId, String)>,

    /// Minimum synthetic nodes required, as requirement sets
    pub new_nodes: Vec<Requirements>,
}

impl SimResult {
    pub fn all_scheduled(&self) -> bool {
        self.unschedulable.is_empty()
    }
}

/// Input to one scheduling replay: a deep copy, mutated by the adapter,
/// never shared back
#[derive(Debug, Clone)]
pub struct SimulationInput {
    /// Surviving placement targets (initialized, not departing)
    pub nodes: Vec<NodeView>,

    /// Pods already resident on the surviving nodes
    pub resident: Vec<PodView>,

    /// Pods the replay must place: displaced plus pending
    pub pods: Vec<PodView>,

    pub pools: Vec<NodePool>,

    /// Healthy catalogs by pool name; pools with a catalog error are absent
    pub catalogs: HashMap<String, Vec<InstanceType>>,
}

/// The external scheduler simulator, consumed as a pure function. CPU-bound;
/// must not retain or mutate shared state.
pub trait SchedulingSimulator: Send + Sync {
    fn simulate(&self, input: &SimulationInput) -> Result<SimResult>;
}

/// Sink for user-visible events
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: DisruptionEvent);
}

/// Recorder that drops everything; useful for wiring and tests
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl EventRecorder for NoopRecorder {
    fn record(&self, _event: DisruptionEvent) {}
}
