//! User-visible disruption events
//!
//! Event text is part of the operator-facing contract; the strings below are
//! matched verbatim by dashboards and runbooks. Reason phrases are kept as
//! constants so the classifier, the methods and the tests agree on them.

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// Reason: displaced or pending pods have nowhere to go
pub const REASON_PODS_WOULD_NOT_SCHEDULE: &str = "not all pods would schedule";

/// Reason: the only capacity left for a displaced pod is still in flight
pub const REASON_UNINITIALIZED_TARGET: &str = "would schedule against a non-initialized node";

/// Reason: no permitted replacement is strictly cheaper
pub const REASON_NO_CHEAPER_REPLACEMENT: &str = "can't replace with a cheaper node";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DisruptionEvent {
    /// A node cannot be consolidated this cycle, with a human-readable reason
    Unconsolidatable { node: NodeId, reason: String },

    /// Committed: deleting a batch of empty nodes
    DeletingEmptyNodes { nodes: Vec<NodeId> },

    /// Committed: replacing nodes with strictly cheaper capacity
    Replacing {
        nodes: Vec<NodeId>,
        instance_types: Vec<String>,
    },
}

impl DisruptionEvent {
    pub fn unconsolidatable(node: &NodeId, reason: impl Into<String>) -> Self {
        Self::Unconsolidatable {
            node: node.clone(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for DisruptionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn braced(items: &[String]) -> String {
            format!("{{{}}}", items.join(", "))
        }
        match self {
            DisruptionEvent::Unconsolidatable { reason, .. } => {
                write!(f, "Unconsolidatable: {reason}")
            }
            DisruptionEvent::DeletingEmptyNodes { nodes } => {
                let names: Vec<String> = nodes.iter().map(|n| n.0.clone()).collect();
                write!(f, "Disrupting: deleting empty nodes {}", braced(&names))
            }
            DisruptionEvent::Replacing {
                nodes,
                instance_types,
            } => {
                let names: Vec<String> = nodes.iter().map(|n| n.0.clone()).collect();
                write!(
                    f,
                    "Disrupting: replacing {} with cheaper instance types {}",
                    braced(&names),
                    braced(instance_types)
                )
            }
        }
    }
}
