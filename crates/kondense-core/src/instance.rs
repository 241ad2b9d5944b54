//! Instance types, offerings and price bounds
//!
//! Price is a set-valued bound, not a number. A candidate is priced at the
//! cheapest offering compatible with its position; a replacement requirement
//! set is priced at the most expensive available offering the executor could
//! legally bind. Comparing the wrong ends of these ranges is how a
//! consolidation pass launches something more expensive than it deleted.

use serde::{Deserialize, Serialize};

use crate::requirements::Requirements;
use crate::types::{CapacityType, NodeView, ResourceVector};

/// A purchasable (capacity type, zone, price) combination of an instance type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offering {
    pub capacity_type: CapacityType,
    pub zone: String,
    pub price: f64,
    pub available: bool,
}

/// An instance type from a node-pool's catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceType {
    pub name: String,
    pub capacity: ResourceVector,
    pub offerings: Vec<Offering>,
}

impl InstanceType {
    pub fn new(name: impl Into<String>, capacity: ResourceVector) -> Self {
        Self {
            name: name.into(),
            capacity,
            offerings: Vec::new(),
        }
    }

    pub fn with_offering(mut self, offering: Offering) -> Self {
        self.offerings.push(offering);
        self
    }

    /// Price of the node's own offering: the candidate side of every
    /// consolidation comparison. Availability is not required — a running
    /// node keeps its price even when its offering is currently sold out.
    ///
    /// Prefers the exact (capacity type, zone) position; falls back to the
    /// cheapest offering compatible with `requirements`. `None` means the
    /// price is unknown and the node cannot be safely consolidated.
    pub fn candidate_price(&self, node: &NodeView, requirements: &Requirements) -> Option<f64> {
        if let Some(offering) = self
            .offerings
            .iter()
            .find(|o| o.capacity_type == node.capacity_type && o.zone == node.zone)
        {
            return Some(offering.price);
        }
        self.offerings
            .iter()
            .filter(|o| requirements.permits_offering(&self.name, o))
            .map(|o| o.price)
            .min_by(f64::total_cmp)
    }

    /// Cheapest available offering permitted by `requirements`
    pub fn cheapest_available(&self, requirements: &Requirements) -> Option<f64> {
        self.permitted_available(requirements)
            .map(|o| o.price)
            .min_by(f64::total_cmp)
    }

    /// Most expensive available offering permitted by `requirements`: the
    /// worst case the cloud provider could bind from this type
    pub fn worst_case_available(&self, requirements: &Requirements) -> Option<f64> {
        self.permitted_available(requirements)
            .map(|o| o.price)
            .max_by(f64::total_cmp)
    }

    fn permitted_available<'a>(
        &'a self,
        requirements: &'a Requirements,
    ) -> impl Iterator<Item = &'a Offering> {
        self.offerings
            .iter()
            .filter(|o| o.available)
            .filter(move |o| requirements.permits_offering(&self.name, o))
    }
}
