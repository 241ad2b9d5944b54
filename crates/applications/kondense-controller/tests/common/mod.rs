//! Shared fixtures for the consolidation scenarios
//!
//! Provides fakes for every collaborator seam plus a deterministic first-fit
//! reference scheduler that honors resource requests, requirement sets,
//! zonal topology spread and pod anti-affinity. The fake clock lives in
//! kondense-core; everything else lives here.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use kondense_core::{
    CapacityType, CloudProvider, ClusterState, CoreError, DisruptionBudget, DisruptionEvent,
    EventRecorder, InstanceType, NodeId, NodePool, NodeView, Offering, PodId, PodView,
    Requirements, ResourceVector, SchedulingSimulator, SimResult, SimTarget, SimulationInput,
    TopologyDomain, UnhealthyPolicy,
};

pub const TEST_ZONES: [&str; 3] = ["test-zone-1", "test-zone-2", "test-zone-3"];

pub fn start_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

// ============================================================================
// Builders
// ============================================================================

pub fn offering(capacity_type: CapacityType, zone: &str, price: f64, available: bool) -> Offering {
    Offering {
        capacity_type,
        zone: zone.to_string(),
        price,
        available,
    }
}

/// An instance type offered on-demand in all three test zones at one price
pub fn uniform_type(name: &str, cpu_milli: u64, price: f64) -> InstanceType {
    let mut ty = InstanceType::new(name, ResourceVector::new(cpu_milli, 8 * cpu_milli, 110));
    for zone in TEST_ZONES {
        ty = ty.with_offering(offering(CapacityType::OnDemand, zone, price, true));
    }
    ty
}

/// The default catalog: ascending prices, capacities to match
pub fn default_catalog() -> Vec<InstanceType> {
    vec![
        uniform_type("m-small", 4_000, 0.1),
        uniform_type("m-medium", 8_000, 0.2),
        uniform_type("m-large", 16_000, 0.4),
        uniform_type("m-xlarge", 32_000, 0.8),
        uniform_type("m-metal", 64_000, 3.2),
    ]
}

pub fn node(id: &str, pool: &str, ty: &InstanceType, zone: &str) -> NodeView {
    let position = ty
        .offerings
        .iter()
        .find(|o| o.zone == zone)
        .unwrap_or_else(|| panic!("type {} has no offering in {zone}", ty.name));
    NodeView {
        id: NodeId::new(id),
        node_pool: Some(pool.to_string()),
        instance_type: ty.name.clone(),
        capacity_type: position.capacity_type,
        zone: zone.to_string(),
        allocatable: ty.capacity,
        created: start_time(),
        initialized: true,
        marked_for_deletion: false,
        nominated: false,
        annotations: BTreeMap::new(),
    }
}

pub fn pod(name: &str, cpu_milli: u64) -> PodView {
    PodView {
        id: PodId::new(format!("default/{name}")),
        namespace: "default".to_string(),
        name: name.to_string(),
        labels: [("app".to_string(), "test".to_string())].into(),
        controller_owned: true,
        daemon: false,
        requests: ResourceVector::new(cpu_milli, 512, 1),
        requirements: Requirements::any(),
        topology_spread: vec![],
        anti_affinity: vec![],
        annotations: BTreeMap::new(),
        bound_node: None,
        ready: true,
    }
}

pub fn bound_pod(name: &str, cpu_milli: u64, node: &str) -> PodView {
    let mut p = pod(name, cpu_milli);
    p.bound_node = Some(NodeId::new(node));
    p
}

pub fn blocking_budget(name: &str, labels: &[(&str, &str)]) -> DisruptionBudget {
    DisruptionBudget {
        name: name.to_string(),
        namespace: "default".to_string(),
        selector: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        disruptions_allowed: 0,
        unhealthy_policy: UnhealthyPolicy::IfHealthyBudget,
    }
}

// ============================================================================
// Fake cluster state
// ============================================================================

#[derive(Default)]
struct ClusterInner {
    nodes: Vec<NodeView>,
    pods: Vec<PodView>,
    pools: Vec<NodePool>,
    budgets: Vec<DisruptionBudget>,
    live_nominations: HashSet<NodeId>,
}

/// Mutable stand-in for the cluster state cache. Tests mutate it mid-TTL to
/// exercise the validation gate.
#[derive(Default)]
pub struct FakeClusterState {
    inner: Mutex<ClusterInner>,
}

impl FakeClusterState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_pool(&self, pool: NodePool) {
        self.inner.lock().unwrap().pools.push(pool);
    }

    pub fn add_node(&self, node: NodeView) {
        self.inner.lock().unwrap().nodes.push(node);
    }

    pub fn add_pod(&self, pod: PodView) {
        self.inner.lock().unwrap().pods.push(pod);
    }

    pub fn add_budget(&self, budget: DisruptionBudget) {
        self.inner.lock().unwrap().budgets.push(budget);
    }

    pub fn annotate_pod(&self, pod: &PodId, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.pods.iter_mut().find(|p| &p.id == pod) {
            p.annotations.insert(key.to_string(), "true".to_string());
        }
    }

    pub fn nominate(&self, node: &NodeId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(n) = inner.nodes.iter_mut().find(|n| &n.id == node) {
            n.nominated = true;
        }
        inner.live_nominations.insert(node.clone());
    }

    pub fn marked(&self) -> BTreeSet<NodeId> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .iter()
            .filter(|n| n.marked_for_deletion)
            .map(|n| n.id.clone())
            .collect()
    }
}

impl ClusterState for FakeClusterState {
    fn nodes(&self) -> Vec<NodeView> {
        self.inner.lock().unwrap().nodes.clone()
    }

    fn pods(&self) -> Vec<PodView> {
        self.inner.lock().unwrap().pods.clone()
    }

    fn pending_pods(&self) -> Vec<PodView> {
        self.inner
            .lock()
            .unwrap()
            .pods
            .iter()
            .filter(|p| p.is_pending())
            .cloned()
            .collect()
    }

    fn node_pools(&self) -> Vec<NodePool> {
        self.inner.lock().unwrap().pools.clone()
    }

    fn budgets(&self) -> Vec<DisruptionBudget> {
        self.inner.lock().unwrap().budgets.clone()
    }

    fn mark_for_deletion(&self, node: &NodeId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(n) = inner.nodes.iter_mut().find(|n| &n.id == node) {
            n.marked_for_deletion = true;
        }
    }

    fn unmark_for_deletion(&self, node: &NodeId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(n) = inner.nodes.iter_mut().find(|n| &n.id == node) {
            n.marked_for_deletion = false;
        }
    }

    fn nomination_expired(&self, node: &NodeId) -> bool {
        !self.inner.lock().unwrap().live_nominations.contains(node)
    }
}

// ============================================================================
// Fake cloud provider
// ============================================================================

/// Catalog server with one default catalog, per-pool overrides and per-pool
/// injected failures
pub struct FakeCloudProvider {
    default_types: Mutex<Vec<InstanceType>>,
    overrides: Mutex<HashMap<String, Vec<InstanceType>>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeCloudProvider {
    pub fn new(default_types: Vec<InstanceType>) -> Arc<Self> {
        Arc::new(Self {
            default_types: Mutex::new(default_types),
            overrides: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub fn set_catalog(&self, pool: &str, types: Vec<InstanceType>) {
        self.overrides
            .lock()
            .unwrap()
            .insert(pool.to_string(), types);
    }

    pub fn fail_pool(&self, pool: &str) {
        self.failing.lock().unwrap().insert(pool.to_string());
    }
}

#[async_trait]
impl CloudProvider for FakeCloudProvider {
    async fn instance_types(&self, node_pool: &NodePool) -> kondense_core::Result<Vec<InstanceType>> {
        if self.failing.lock().unwrap().contains(&node_pool.name) {
            return Err(CoreError::provider(format!(
                "catalog fetch failed for {}",
                node_pool.name
            )));
        }
        if let Some(types) = self.overrides.lock().unwrap().get(&node_pool.name) {
            return Ok(types.clone());
        }
        Ok(self.default_types.lock().unwrap().clone())
    }
}

// ============================================================================
// Fake recorder
// ============================================================================

#[derive(Default)]
pub struct FakeRecorder {
    events: Mutex<Vec<DisruptionEvent>>,
}

impl FakeRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<DisruptionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn rendered(&self) -> Vec<String> {
        self.events().iter().map(|e| e.to_string()).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.rendered().iter().any(|s| s.contains(needle))
    }
}

impl EventRecorder for FakeRecorder {
    fn record(&self, event: DisruptionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ============================================================================
// First-fit reference scheduler
// ============================================================================

/// Where a placed pod sits for constraint accounting
#[derive(Clone)]
struct Position {
    /// `None` while a synthetic node's zone set is still plural
    zone: Option<String>,
    node_key: String,
}

/// A synthetic node opened during the replay
struct OpenNode {
    key: String,
    pool: String,
    zones: BTreeSet<String>,
    capacity_types: BTreeSet<CapacityType>,
    types: Vec<InstanceType>,
    used: ResourceVector,
}

/// Deterministic first-fit scheduler: packs onto surviving nodes first, then
/// onto already-open synthetic nodes, then opens the fewest synthetic nodes
/// it can. Honors requirement sets, zonal/node topology spread (`max_skew`)
/// and pod anti-affinity.
pub struct FirstFitSimulator;

impl SchedulingSimulator for FirstFitSimulator {
    fn simulate(&self, input: &SimulationInput) -> kondense_core::Result<SimResult> {
        let mut result = SimResult::default();

        let zone_universe: BTreeSet<String> = input
            .catalogs
            .values()
            .flatten()
            .flat_map(|ty| ty.offerings.iter().map(|o| o.zone.clone()))
            .chain(input.nodes.iter().map(|n| n.zone.clone()))
            .collect();

        let mut nodes: Vec<&NodeView> = input.nodes.iter().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut free: HashMap<&NodeId, ResourceVector> = nodes
            .iter()
            .map(|n| {
                let used = input
                    .resident
                    .iter()
                    .filter(|p| p.bound_node.as_ref() == Some(&n.id))
                    .fold(ResourceVector::default(), |acc, p| acc.add(&p.requests));
                (&n.id, n.allocatable.saturating_sub(&used))
            })
            .collect();

        // Constraint state: every pod that already sits somewhere
        let mut placed: Vec<(PodView, Position)> = input
            .resident
            .iter()
            .filter_map(|p| {
                let node_id = p.bound_node.as_ref()?;
                let node = nodes.iter().find(|n| &n.id == node_id)?;
                Some((
                    p.clone(),
                    Position {
                        zone: Some(node.zone.clone()),
                        node_key: node.id.0.clone(),
                    },
                ))
            })
            .collect();

        let mut open: Vec<OpenNode> = Vec::new();

        let mut pending: Vec<&PodView> = input.pods.iter().collect();
        pending.sort_by(|a, b| {
            b.requests
                .cpu_milli
                .cmp(&a.requests.cpu_milli)
                .then_with(|| a.id.cmp(&b.id))
        });

        'pods: for p in pending {
            // 1. Surviving nodes, id order
            for n in &nodes {
                let node_free = free[&n.id];
                if !p.requests.fits(&node_free) || !p.requirements.permits_node(n) {
                    continue;
                }
                let pos = Position {
                    zone: Some(n.zone.clone()),
                    node_key: n.id.0.clone(),
                };
                if !anti_affinity_ok(p, &pos, &placed) {
                    continue;
                }
                if !spread_ok(p, &pos, &placed, &zone_universe) {
                    continue;
                }
                free.insert(&n.id, node_free.saturating_sub(&p.requests));
                placed.push((p.clone(), pos));
                result
                    .scheduled
                    .push((p.id.clone(), SimTarget::Existing(n.id.clone())));
                continue 'pods;
            }

            // 2. Already-open synthetic nodes
            for (index, o) in open.iter_mut().enumerate() {
                let needed = o.used.add(&p.requests);
                let feasible_types: Vec<InstanceType> = o
                    .types
                    .iter()
                    .filter(|ty| needed.fits(&ty.capacity))
                    .cloned()
                    .collect();
                if feasible_types.is_empty() {
                    continue;
                }
                let pod_zones = constrained_zones(p, &o.zones);
                let zones: BTreeSet<String> = pod_zones
                    .into_iter()
                    .filter(|z| {
                        let pos = Position {
                            zone: Some(z.clone()),
                            node_key: o.key.clone(),
                        };
                        anti_affinity_ok(p, &pos, &placed)
                            && spread_ok(p, &pos, &placed, &zone_universe)
                    })
                    .collect();
                if zones.is_empty() {
                    continue;
                }
                let zones = zones_with_offerings(&feasible_types, &zones, &o.capacity_types);
                if zones.is_empty() {
                    continue;
                }
                o.types = feasible_types;
                o.zones = zones;
                o.used = needed;
                let pos = Position {
                    zone: single_zone(&o.zones),
                    node_key: o.key.clone(),
                };
                placed.push((p.clone(), pos));
                result.scheduled.push((p.id.clone(), SimTarget::New(index)));
                continue 'pods;
            }

            // 3. Open a new synthetic node under some pool
            let mut pools: Vec<&NodePool> = input.pools.iter().collect();
            pools.sort_by(|a, b| a.name.cmp(&b.name));
            for pool in pools {
                let Some(catalog) = input.catalogs.get(&pool.name) else {
                    continue;
                };
                let Some(met) = pool.requirements.intersect(&p.requirements) else {
                    continue;
                };
                let key = format!("new-{}", open.len());
                let zone_candidates = if met.zones.is_empty() {
                    zone_universe.clone()
                } else {
                    met.zones.clone()
                };
                let zones: BTreeSet<String> = zone_candidates
                    .into_iter()
                    .filter(|z| {
                        let pos = Position {
                            zone: Some(z.clone()),
                            node_key: key.clone(),
                        };
                        anti_affinity_ok(p, &pos, &placed)
                            && spread_ok(p, &pos, &placed, &zone_universe)
                    })
                    .collect();
                if zones.is_empty() {
                    continue;
                }
                let types: Vec<InstanceType> = catalog
                    .iter()
                    .filter(|ty| {
                        met.instance_types.is_empty() || met.instance_types.contains(&ty.name)
                    })
                    .filter(|ty| p.requests.fits(&ty.capacity))
                    .filter(|ty| {
                        ty.offerings.iter().any(|o| {
                            o.available
                                && zones.contains(&o.zone)
                                && (met.capacity_types.is_empty()
                                    || met.capacity_types.contains(&o.capacity_type))
                        })
                    })
                    .cloned()
                    .collect();
                if types.is_empty() {
                    continue;
                }
                let zones = zones_with_offerings(&types, &zones, &met.capacity_types);
                let pos = Position {
                    zone: single_zone(&zones),
                    node_key: key.clone(),
                };
                placed.push((p.clone(), pos));
                result
                    .scheduled
                    .push((p.id.clone(), SimTarget::New(open.len())));
                open.push(OpenNode {
                    key,
                    pool: pool.name.clone(),
                    zones,
                    capacity_types: met.capacity_types.clone(),
                    types,
                    used: p.requests,
                });
                continue 'pods;
            }

            result
                .unschedulable
                .push((p.id.clone(), "does not fit on any node".to_string()));
        }

        result.new_nodes = open
            .into_iter()
            .map(|o| Requirements {
                node_pools: [o.pool].into(),
                zones: o.zones,
                capacity_types: o.capacity_types,
                instance_types: o.types.into_iter().map(|t| t.name).collect(),
            })
            .collect();
        Ok(result)
    }
}

fn single_zone(zones: &BTreeSet<String>) -> Option<String> {
    if zones.len() == 1 {
        zones.iter().next().cloned()
    } else {
        None
    }
}

fn constrained_zones(p: &PodView, node_zones: &BTreeSet<String>) -> BTreeSet<String> {
    if p.requirements.zones.is_empty() {
        node_zones.clone()
    } else {
        node_zones
            .intersection(&p.requirements.zones)
            .cloned()
            .collect()
    }
}

/// Keep only zones some type still has an available, capacity-type-permitted
/// offering in
fn zones_with_offerings(
    types: &[InstanceType],
    zones: &BTreeSet<String>,
    capacity_types: &BTreeSet<CapacityType>,
) -> BTreeSet<String> {
    zones
        .iter()
        .filter(|z| {
            types.iter().any(|ty| {
                ty.offerings.iter().any(|o| {
                    o.available
                        && &o.zone == *z
                        && (capacity_types.is_empty() || capacity_types.contains(&o.capacity_type))
                })
            })
        })
        .cloned()
        .collect()
}

fn anti_affinity_ok(p: &PodView, pos: &Position, placed: &[(PodView, Position)]) -> bool {
    p.anti_affinity.iter().all(|term| {
        !placed.iter().any(|(other, other_pos)| {
            if !other.matches_selector(&term.selector) {
                return false;
            }
            match term.domain {
                TopologyDomain::Node => other_pos.node_key == pos.node_key,
                TopologyDomain::Zone => match (&other_pos.zone, &pos.zone) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            }
        })
    })
}

fn spread_ok(
    p: &PodView,
    pos: &Position,
    placed: &[(PodView, Position)],
    zone_universe: &BTreeSet<String>,
) -> bool {
    p.topology_spread.iter().all(|constraint| {
        let target = match constraint.domain {
            TopologyDomain::Zone => match &pos.zone {
                Some(zone) => zone.clone(),
                // A plural-zone synthetic node cannot prove the skew holds
                None => return false,
            },
            TopologyDomain::Node => pos.node_key.clone(),
        };

        let mut counts: BTreeMap<String, u32> = match constraint.domain {
            TopologyDomain::Zone => zone_universe.iter().map(|z| (z.clone(), 0)).collect(),
            TopologyDomain::Node => BTreeMap::new(),
        };
        for (other, other_pos) in placed {
            if !other.matches_selector(&constraint.selector) {
                continue;
            }
            let domain = match constraint.domain {
                TopologyDomain::Zone => match &other_pos.zone {
                    Some(zone) => zone.clone(),
                    None => continue,
                },
                TopologyDomain::Node => other_pos.node_key.clone(),
            };
            *counts.entry(domain).or_insert(0) += 1;
        }
        *counts.entry(target.clone()).or_insert(0) += 1;

        let min = counts.values().copied().min().unwrap_or(0);
        counts[&target] - min <= constraint.max_skew
    })
}
