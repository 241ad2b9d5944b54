//! Multi-node consolidation
//!
//! Searches for the largest cost-ordered prefix of candidates that can be
//! deleted together with at most one strictly cheaper replacement. The
//! search is a binary search over the prefix length: removals get harder as
//! the prefix grows, so validity is treated as monotone. On deadline expiry
//! the best valid command found so far is returned.

use chrono::{DateTime, Utc};
use kondense_core::{Command, ConsolidationMethod, NoopRecorder, Result};
use tracing::debug;

use crate::candidates::Candidate;
use crate::consolidation::{compute_command, EngineContext};

/// Bound on how many candidates one multi-node pass will consider
pub const MAX_MULTI_CANDIDATES: usize = 100;

pub fn compute_multi_command(
    ctx: &EngineContext<'_>,
    candidates: &[Candidate],
    deadline: DateTime<Utc>,
) -> Result<Option<Command>> {
    let evictable: Vec<&Candidate> = candidates.iter().filter(|c| c.evictable).collect();
    if evictable.len() < 2 {
        return Ok(None);
    }

    // Probe prefixes are not decisions; the search runs muted
    let quiet = EngineContext {
        recorder: &NoopRecorder,
        ..*ctx
    };

    let mut best: Option<Command> = None;
    let mut lo = 2usize;
    let mut hi = evictable.len().min(MAX_MULTI_CANDIDATES);
    while lo <= hi {
        if ctx.clock.now() >= deadline {
            debug!(
                found = best.is_some(),
                "multi-node consolidation timed out, keeping best valid command"
            );
            break;
        }
        let mid = (lo + hi) / 2;
        match compute_command(&quiet, &evictable[..mid], ConsolidationMethod::MultiNode)? {
            Some(command) => {
                best = Some(command);
                lo = mid + 1;
            }
            None => {
                hi = mid - 1;
            }
        }
    }
    Ok(best)
}
