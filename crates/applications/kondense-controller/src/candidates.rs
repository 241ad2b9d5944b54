//! Candidate classification
//!
//! Filters the snapshot's nodes down to the set the methods may act on.
//! Rejections are surfaced as user-visible events; a node hosting a pod
//! behind an exhausted disruption budget stays classified but is flagged
//! non-evictable, which forbids any command that would displace its pods.

use std::collections::HashMap;

use kondense_core::{
    Clock, ClusterSnapshot, ClusterState, CloudProvider, CoreError, DisruptionEvent, InstanceType,
    NodePool, NodeView, PodView, DO_NOT_DISRUPT_ANNOTATION,
};
use tracing::{debug, warn};

use crate::cost::disruption_cost;

/// A node eligible for disruption this reconcile, with everything the
/// methods need resolved up front
#[derive(Debug, Clone)]
pub struct Candidate {
    pub node: NodeView,
    /// Resident pods, daemons included
    pub pods: Vec<PodView>,
    pub pool: NodePool,
    pub instance_type: InstanceType,
    /// The node's own offering price (candidate side of every comparison)
    pub price: f64,
    /// Disruption cost; candidates are consumed in ascending order
    pub cost: f64,
    /// False when an exhausted disruption budget covers a resident pod
    pub evictable: bool,
}

impl Candidate {
    /// Empty means nothing but daemon pods
    pub fn is_empty(&self) -> bool {
        self.pods.iter().all(|p| p.daemon)
    }

    /// The pods a command over this candidate would displace, unbound so the
    /// simulator re-places them
    pub fn displaced_pods(&self) -> Vec<PodView> {
        self.pods
            .iter()
            .filter(|p| !p.daemon)
            .cloned()
            .map(|mut p| {
                p.bound_node = None;
                p
            })
            .collect()
    }
}

/// Per-reconcile instance-type catalogs, one fetch per pool. A pool whose
/// fetch fails is unhealthy for the cycle; its candidates are skipped while
/// every other pool proceeds.
pub struct Catalogs {
    by_pool: HashMap<String, kondense_core::Result<Vec<InstanceType>>>,
}

impl Catalogs {
    pub async fn fetch(provider: &dyn CloudProvider, pools: &[NodePool]) -> Self {
        let mut by_pool = HashMap::new();
        for pool in pools {
            let entry = match provider.instance_types(pool).await {
                Ok(types) if !types.is_empty() => Ok(types),
                Ok(_) => {
                    warn!(pool = %pool.name, "node pool advertises an empty instance-type catalog");
                    Err(CoreError::CatalogUnavailable(pool.name.clone()))
                }
                Err(err) => {
                    warn!(pool = %pool.name, error = %err, "instance-type catalog fetch failed");
                    Err(err)
                }
            };
            by_pool.insert(pool.name.clone(), entry);
        }
        Self { by_pool }
    }

    /// The catalog of a healthy pool
    pub fn healthy(&self, pool: &str) -> Option<&[InstanceType]> {
        match self.by_pool.get(pool) {
            Some(Ok(types)) => Some(types),
            _ => None,
        }
    }

    pub fn lookup_type(&self, pool: &str, instance_type: &str) -> Option<&InstanceType> {
        self.healthy(pool)?.iter().find(|t| t.name == instance_type)
    }

    /// Healthy catalogs keyed by pool, cloned for a simulation input
    pub fn healthy_map(&self) -> HashMap<String, Vec<InstanceType>> {
        self.by_pool
            .iter()
            .filter_map(|(name, entry)| match entry {
                Ok(types) => Some((name.clone(), types.clone())),
                Err(_) => None,
            })
            .collect()
    }
}

/// Assemble the immutable per-reconcile snapshot from the cluster state cache
pub fn build_snapshot(cluster: &dyn ClusterState) -> ClusterSnapshot {
    ClusterSnapshot {
        nodes: cluster.nodes(),
        pods: cluster.pods(),
        pools: cluster.node_pools(),
        budgets: cluster.budgets(),
    }
}

/// Classify the snapshot's nodes into disruption candidates, sorted
/// ascending by disruption cost. Every rejection of an otherwise live node
/// yields a user-visible event.
pub fn classify(
    snapshot: &ClusterSnapshot,
    catalogs: &Catalogs,
    cluster: &dyn ClusterState,
    clock: &dyn Clock,
) -> (Vec<Candidate>, Vec<DisruptionEvent>) {
    let now = clock.now();
    let mut candidates = Vec::new();
    let mut events = Vec::new();

    for node in &snapshot.nodes {
        // Departing capacity was already decided on; nothing to say about it
        if node.marked_for_deletion {
            continue;
        }

        let mut reject = |reason: String| {
            events.push(DisruptionEvent::unconsolidatable(&node.id, reason));
        };

        if node.has_disruption_veto() {
            reject(format!(
                "node is annotated {DO_NOT_DISRUPT_ANNOTATION}"
            ));
            continue;
        }
        let pods: Vec<PodView> = snapshot.pods_on(&node.id).into_iter().cloned().collect();
        if let Some(veto) = pods.iter().find(|p| p.has_eviction_veto()) {
            reject(format!("pod {} blocks disruption", veto.id));
            continue;
        }
        if !node.initialized {
            reject("node is not initialized".to_string());
            continue;
        }
        let Some(pool_name) = node.node_pool.as_deref() else {
            reject("node is not owned by a node pool".to_string());
            continue;
        };
        let Some(pool) = snapshot.pool(pool_name) else {
            reject(format!("node pool {pool_name} is unknown"));
            continue;
        };
        let Some(instance_type) = catalogs.lookup_type(pool_name, &node.instance_type) else {
            reject(format!(
                "instance-type catalog unavailable for node pool {pool_name}"
            ));
            continue;
        };
        let Some(price) = instance_type.candidate_price(node, &pool.requirements) else {
            // Unknown price makes any replace decision unsafe
            reject(format!(
                "no offering price known for instance type {}",
                node.instance_type
            ));
            continue;
        };
        if node.nominated && !cluster.nomination_expired(&node.id) {
            debug!(node = %node.id, "skipping node reserved for pending pods");
            continue;
        }

        let evictable = !pods
            .iter()
            .any(|p| !p.daemon && snapshot.eviction_blocked(p));
        let cost = disruption_cost(node, &pods, Some(pool), now);

        candidates.push(Candidate {
            node: node.clone(),
            pods,
            pool: pool.clone(),
            instance_type: instance_type.clone(),
            price,
            cost,
            evictable,
        });
    }

    candidates.sort_by(|a, b| {
        a.cost
            .total_cmp(&b.cost)
            .then_with(|| a.node.id.cmp(&b.node.id))
    });
    (candidates, events)
}
