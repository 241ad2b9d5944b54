//! Cluster inventory views consumed by the decision engine
//!
//! These are read-only projections of the cluster state cache. A snapshot is
//! assembled once per reconcile and never mutated; the only write path back
//! into the cluster model is `ClusterState::mark_for_deletion`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Node annotation opting the node out of disruption entirely.
pub const DO_NOT_DISRUPT_ANNOTATION: &str = "karpenter.sh/do-not-disrupt";

/// Legacy node annotation, accepted for compatibility. New code emits only
/// the `do-not-disrupt` key.
pub const DO_NOT_CONSOLIDATE_ANNOTATION: &str = "karpenter.sh/do-not-consolidate";

/// Legacy pod annotation vetoing eviction of the pod's node.
pub const DO_NOT_EVICT_ANNOTATION: &str = "karpenter.sh/do-not-evict";

/// Unique identifier for a node (the cloud provider id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a pod
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodId(pub String);

impl PodId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for PodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capacity type of an offering or a running node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CapacityType {
    OnDemand,
    Spot,
}

impl std::fmt::Display for CapacityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityType::OnDemand => write!(f, "on-demand"),
            CapacityType::Spot => write!(f, "spot"),
        }
    }
}

/// Resource vector over the dimensions the engine schedules on.
///
/// Integral units (millicores, MiB, pod slots) so capacity math is exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceVector {
    pub cpu_milli: u64,
    pub memory_mib: u64,
    pub pods: u64,
}

impl ResourceVector {
    pub fn new(cpu_milli: u64, memory_mib: u64, pods: u64) -> Self {
        Self {
            cpu_milli,
            memory_mib,
            pods,
        }
    }

    /// Component-wise sum
    pub fn add(&self, other: &ResourceVector) -> ResourceVector {
        ResourceVector {
            cpu_milli: self.cpu_milli + other.cpu_milli,
            memory_mib: self.memory_mib + other.memory_mib,
            pods: self.pods + other.pods,
        }
    }

    /// Component-wise saturating difference
    pub fn saturating_sub(&self, other: &ResourceVector) -> ResourceVector {
        ResourceVector {
            cpu_milli: self.cpu_milli.saturating_sub(other.cpu_milli),
            memory_mib: self.memory_mib.saturating_sub(other.memory_mib),
            pods: self.pods.saturating_sub(other.pods),
        }
    }

    /// True if `self` fits within `capacity` on every dimension
    pub fn fits(&self, capacity: &ResourceVector) -> bool {
        self.cpu_milli <= capacity.cpu_milli
            && self.memory_mib <= capacity.memory_mib
            && self.pods <= capacity.pods
    }

    pub fn is_zero(&self) -> bool {
        *self == ResourceVector::default()
    }
}

/// Topology domain a spread constraint or anti-affinity term ranges over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyDomain {
    Zone,
    Node,
}

/// Pod topology-spread constraint (`maxSkew` over a domain, hard)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySpread {
    pub max_skew: u32,
    pub domain: TopologyDomain,
    /// Pods counted towards the skew: label subset match
    pub selector: BTreeMap<String, String>,
}

/// Pod anti-affinity term: never co-locate with a matching pod in the domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiAffinity {
    pub domain: TopologyDomain,
    pub selector: BTreeMap<String, String>,
}

/// Scheduling view of a pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodView {
    pub id: PodId,
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,

    /// True when a controller (replica set, job, ...) owns the pod.
    /// Bare pods are costlier to displace.
    pub controller_owned: bool,

    /// Daemon pods ride along with their node: they are tolerated on empty
    /// nodes and are never displaced by a command.
    pub daemon: bool,

    pub requests: ResourceVector,

    /// Node-selector style constraints the pod places on its node
    pub requirements: crate::Requirements,

    pub topology_spread: Vec<TopologySpread>,
    pub anti_affinity: Vec<AntiAffinity>,

    pub annotations: BTreeMap<String, String>,

    /// Current binding; `None` marks the pod pending
    pub bound_node: Option<NodeId>,

    /// Readiness condition, consulted by the PDB unhealthy-pod bypass
    pub ready: bool,
}

impl PodView {
    /// True if the pod carries an eviction veto (either annotation generation)
    pub fn has_eviction_veto(&self) -> bool {
        self.annotations.contains_key(DO_NOT_EVICT_ANNOTATION)
            || self.annotations.contains_key(DO_NOT_DISRUPT_ANNOTATION)
    }

    pub fn is_pending(&self) -> bool {
        self.bound_node.is_none()
    }

    /// Label subset match against a selector
    pub fn matches_selector(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(k) == Some(v))
    }
}

/// Candidate view of a node, immutable per reconcile pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: NodeId,

    /// Owning node-pool label; `None` marks unmanaged capacity
    pub node_pool: Option<String>,

    pub instance_type: String,
    pub capacity_type: CapacityType,
    pub zone: String,
    pub allocatable: ResourceVector,
    pub created: DateTime<Utc>,

    /// Readiness: uninitialized nodes are in-flight capacity and are neither
    /// candidates nor simulation targets
    pub initialized: bool,

    /// Set at command commit; departing nodes cannot receive pods
    pub marked_for_deletion: bool,

    /// True while the node holds an unexpired nomination for pending pods
    pub nominated: bool,

    pub annotations: BTreeMap<String, String>,
}

impl NodeView {
    /// True if the node opts out of disruption via either annotation generation
    pub fn has_disruption_veto(&self) -> bool {
        self.annotations.contains_key(DO_NOT_DISRUPT_ANNOTATION)
            || self.annotations.contains_key(DO_NOT_CONSOLIDATE_ANNOTATION)
    }

    pub fn is_managed(&self) -> bool {
        self.node_pool.is_some()
    }
}

/// Node-pool template: owns nodes, constrains what may be launched under it,
/// and advertises an instance-type catalog through the cloud provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePool {
    pub name: String,

    /// Constraints on every node the pool may launch
    pub requirements: crate::Requirements,

    /// Node lifetime; nodes approaching expiry are cheaper to disrupt
    pub expire_after: Option<std::time::Duration>,
}

impl NodePool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirements: crate::Requirements::any(),
            expire_after: None,
        }
    }

    pub fn with_requirements(mut self, requirements: crate::Requirements) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_expire_after(mut self, expire_after: std::time::Duration) -> Self {
        self.expire_after = Some(expire_after);
        self
    }
}

/// How a blocking budget treats pods that are not ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnhealthyPolicy {
    /// Unready pods still consume the budget
    IfHealthyBudget,
    /// Unready pods may always be evicted, budget or not
    AlwaysAllow,
}

/// Pod disruption budget, reduced to what the eviction gate needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisruptionBudget {
    pub name: String,
    pub namespace: String,
    pub selector: BTreeMap<String, String>,
    pub disruptions_allowed: u32,
    pub unhealthy_policy: UnhealthyPolicy,
}

impl DisruptionBudget {
    pub fn selects(&self, pod: &PodView) -> bool {
        pod.namespace == self.namespace && pod.matches_selector(&self.selector)
    }

    /// True if evicting `pod` is forbidden by this budget
    pub fn blocks_eviction(&self, pod: &PodView) -> bool {
        if !self.selects(pod) || self.disruptions_allowed > 0 {
            return false;
        }
        // Unhealthy pods bypass an exhausted budget under AlwaysAllow
        !(self.unhealthy_policy == UnhealthyPolicy::AlwaysAllow && !pod.ready)
    }
}

/// Immutable inventory assembled at the start of each reconcile
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub nodes: Vec<NodeView>,
    pub pods: Vec<PodView>,
    pub pools: Vec<NodePool>,
    pub budgets: Vec<DisruptionBudget>,
}

impl ClusterSnapshot {
    /// Resident pods of a node
    pub fn pods_on(&self, node: &NodeId) -> Vec<&PodView> {
        self.pods
            .iter()
            .filter(|p| p.bound_node.as_ref() == Some(node))
            .collect()
    }

    /// Pods with no binding
    pub fn pending_pods(&self) -> Vec<&PodView> {
        self.pods.iter().filter(|p| p.is_pending()).collect()
    }

    pub fn pool(&self, name: &str) -> Option<&NodePool> {
        self.pools.iter().find(|p| p.name == name)
    }

    /// True if any exhausted budget forbids evicting `pod`
    pub fn eviction_blocked(&self, pod: &PodView) -> bool {
        self.budgets.iter().any(|b| b.blocks_eviction(pod))
    }
}
