//! Empty-node consolidation
//!
//! The cheapest disruption there is: nodes holding nothing but daemon pods
//! are deleted in one batch, no simulation, no replacement. Runs first every
//! cycle; the validation gate re-checks emptiness after the TTL.

use kondense_core::{Command, ConsolidationMethod};
use tracing::debug;

use crate::candidates::Candidate;

/// Batch-delete command over every empty candidate, or `None` when the
/// cluster has no empty candidates
pub fn compute_empty_command(candidates: &[Candidate]) -> Option<Command> {
    let empty: Vec<_> = candidates
        .iter()
        .filter(|c| c.is_empty())
        .map(|c| c.node.id.clone())
        .collect();
    if empty.is_empty() {
        return None;
    }
    debug!(count = empty.len(), "proposing empty-node deletion");
    Some(Command::delete(empty, ConsolidationMethod::Empty))
}
