//! Single-node consolidation
//!
//! Walks the candidates in cost order and takes the first one whose removal
//! is valid, optionally with one strictly cheaper replacement. The walk is
//! bounded by a wall-clock deadline; a timeout leaves a cursor behind so the
//! next reconcile resumes where this one stopped instead of re-examining the
//! cheap prefix forever.

use chrono::{DateTime, Utc};
use kondense_core::{Command, ConsolidationMethod, Result};
use tracing::debug;

use crate::candidates::Candidate;
use crate::consolidation::{compute_command, EngineContext};

#[derive(Debug, Default)]
pub struct SingleNodeConsolidation {
    /// Index into the evictable candidate order where a timed-out pass
    /// stopped; the next pass picks up from here
    cursor: usize,
}

impl SingleNodeConsolidation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute(
        &mut self,
        ctx: &EngineContext<'_>,
        candidates: &[Candidate],
        deadline: DateTime<Utc>,
    ) -> Result<Option<Command>> {
        let evictable: Vec<&Candidate> = candidates.iter().filter(|c| c.evictable).collect();
        if self.cursor >= evictable.len() {
            self.cursor = 0;
        }

        for (index, candidate) in evictable.iter().enumerate().skip(self.cursor) {
            if ctx.clock.now() >= deadline {
                debug!(
                    examined = index,
                    remaining = evictable.len() - index,
                    "single-node consolidation timed out, resuming next reconcile"
                );
                self.cursor = index;
                return Ok(None);
            }
            if let Some(command) =
                compute_command(ctx, std::slice::from_ref(candidate), ConsolidationMethod::SingleNode)?
            {
                self.cursor = 0;
                return Ok(Some(command));
            }
        }

        self.cursor = 0;
        Ok(None)
    }
}
