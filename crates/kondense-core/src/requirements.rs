//! Set-valued scheduling constraints
//!
//! A requirement set constrains a node position along the well-known
//! dimensions (node pool, zone, capacity type, instance type). An empty set
//! on a dimension means unconstrained. Replacement node claims carry a
//! requirement set rather than a single instance: the executor is free to
//! bind any permitted combination at launch, which is why price comparisons
//! must use the worst case over the whole set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::instance::Offering;
use crate::types::{CapacityType, NodeView};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub node_pools: BTreeSet<String>,
    pub zones: BTreeSet<String>,
    pub capacity_types: BTreeSet<CapacityType>,
    pub instance_types: BTreeSet<String>,
}

impl Requirements {
    /// The unconstrained requirement set
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_node_pool(mut self, pool: impl Into<String>) -> Self {
        self.node_pools.insert(pool.into());
        self
    }

    pub fn with_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zones.extend(zones.into_iter().map(Into::into));
        self
    }

    pub fn with_capacity_types<I>(mut self, capacity_types: I) -> Self
    where
        I: IntoIterator<Item = CapacityType>,
    {
        self.capacity_types.extend(capacity_types);
        self
    }

    pub fn with_instance_types<I, S>(mut self, instance_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instance_types
            .extend(instance_types.into_iter().map(Into::into));
        self
    }

    fn permits<T: Ord>(set: &BTreeSet<T>, value: &T) -> bool {
        set.is_empty() || set.contains(value)
    }

    /// True if an existing node satisfies this requirement set
    pub fn permits_node(&self, node: &NodeView) -> bool {
        let pool_ok = match &node.node_pool {
            Some(pool) => Self::permits(&self.node_pools, pool),
            None => self.node_pools.is_empty(),
        };
        pool_ok
            && Self::permits(&self.zones, &node.zone)
            && Self::permits(&self.capacity_types, &node.capacity_type)
            && Self::permits(&self.instance_types, &node.instance_type)
    }

    /// True if an offering of the named instance type satisfies this set
    pub fn permits_offering(&self, instance_type: &str, offering: &Offering) -> bool {
        Self::permits(&self.instance_types, &instance_type.to_string())
            && Self::permits(&self.zones, &offering.zone)
            && Self::permits(&self.capacity_types, &offering.capacity_type)
    }

    /// Dimension-wise intersection; an empty dimension acts as the universe.
    ///
    /// Returns `None` when two constrained dimensions are disjoint: no node
    /// can satisfy both sides, which must not collapse back into
    /// "unconstrained".
    pub fn intersect(&self, other: &Requirements) -> Option<Requirements> {
        fn meet<T: Ord + Clone>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> Option<BTreeSet<T>> {
            match (a.is_empty(), b.is_empty()) {
                (true, _) => Some(b.clone()),
                (_, true) => Some(a.clone()),
                _ => {
                    let met: BTreeSet<T> = a.intersection(b).cloned().collect();
                    if met.is_empty() {
                        None
                    } else {
                        Some(met)
                    }
                }
            }
        }
        Some(Requirements {
            node_pools: meet(&self.node_pools, &other.node_pools)?,
            zones: meet(&self.zones, &other.zones)?,
            capacity_types: meet(&self.capacity_types, &other.capacity_types)?,
            instance_types: meet(&self.instance_types, &other.instance_types)?,
        })
    }
}
