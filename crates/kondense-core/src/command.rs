//! Disruption commands and replacement node claims

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::instance::InstanceType;
use crate::requirements::Requirements;
use crate::types::NodeId;

/// What a command does to its candidate set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisruptionAction {
    Delete,
    Replace,
}

/// Which consolidation method produced a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsolidationMethod {
    Empty,
    SingleNode,
    MultiNode,
}

impl std::fmt::Display for ConsolidationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsolidationMethod::Empty => write!(f, "empty"),
            ConsolidationMethod::SingleNode => write!(f, "single-node"),
            ConsolidationMethod::MultiNode => write!(f, "multi-node"),
        }
    }
}

/// A replacement to launch: a requirement set, not a concrete instance.
/// The executor binds any permitted combination at launch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeClaim {
    pub requirements: Requirements,
}

impl NodeClaim {
    pub fn new(requirements: Requirements) -> Self {
        Self { requirements }
    }

    /// The most expensive price the executor could legally bind from this
    /// claim, given the owning pool's catalog
    pub fn worst_case_price(&self, catalog: &[InstanceType]) -> Option<f64> {
        catalog
            .iter()
            .filter(|ty| {
                self.requirements.instance_types.is_empty()
                    || self.requirements.instance_types.contains(&ty.name)
            })
            .filter_map(|ty| ty.worst_case_available(&self.requirements))
            .max_by(f64::total_cmp)
    }
}

/// A proposed disruption over a candidate set. Created by a method, either
/// committed to the executor queue or dropped; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub action: DisruptionAction,
    pub candidates: Vec<NodeId>,
    pub replacements: Vec<NodeClaim>,
    pub method: ConsolidationMethod,
}

impl Command {
    pub fn delete(mut candidates: Vec<NodeId>, method: ConsolidationMethod) -> Self {
        candidates.sort();
        Self {
            id: Uuid::new_v4(),
            action: DisruptionAction::Delete,
            candidates,
            replacements: Vec::new(),
            method,
        }
    }

    pub fn replace(
        mut candidates: Vec<NodeId>,
        replacements: Vec<NodeClaim>,
        method: ConsolidationMethod,
    ) -> Self {
        candidates.sort();
        Self {
            id: Uuid::new_v4(),
            action: DisruptionAction::Replace,
            candidates,
            replacements,
            method,
        }
    }

    /// Validation-gate equivalence: same action over the same candidates
    /// with the same replacement requirement sets. Command ids differ by
    /// construction and are ignored.
    pub fn is_equivalent(&self, other: &Command) -> bool {
        self.action == other.action
            && self.candidates == other.candidates
            && self.replacements.len() == other.replacements.len()
            && self
                .replacements
                .iter()
                .zip(other.replacements.iter())
                .all(|(a, b)| a.requirements == b.requirements)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nodes = self
            .candidates
            .iter()
            .map(|n| n.0.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        match self.action {
            DisruptionAction::Delete => write!(f, "{} delete {{{nodes}}}", self.method),
            DisruptionAction::Replace => write!(
                f,
                "{} replace {{{nodes}}} with {} claim(s)",
                self.method,
                self.replacements.len()
            ),
        }
    }
}
