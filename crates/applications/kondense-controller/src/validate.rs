//! Validation gate
//!
//! Between deciding and acting the cluster keeps moving: a veto pod lands, a
//! budget is exhausted, a new pod changes which replacement would be needed.
//! The gate waits out a stabilization TTL on the injected clock, then
//! re-derives the decision for the same candidates against a fresh snapshot
//! and commits only an equivalent command. A mismatch drops the command
//! silently; the next reconcile re-derives from scratch.

use std::time::Duration;

use kondense_core::{
    Clock, CloudProvider, ClusterState, Command, ConsolidationMethod, NoopRecorder,
    SchedulingSimulator,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::candidates::{build_snapshot, classify, Candidate, Catalogs};
use crate::consolidation::{compute_command, EngineContext};
use crate::error::{ConsolidationError, Result};

pub struct ValidationGate {
    ttl: Duration,
}

impl ValidationGate {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Park on the TTL, then re-judge `command` against the latest snapshot.
    /// Returns `Ok(true)` only when the fresh derivation is equivalent.
    pub async fn validate(
        &self,
        cluster: &dyn ClusterState,
        provider: &dyn CloudProvider,
        simulator: &dyn SchedulingSimulator,
        clock: &dyn Clock,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        clock.sleep(self.ttl).await;
        if cancel.is_cancelled() {
            return Err(ConsolidationError::Cancelled);
        }

        let snapshot = build_snapshot(cluster);
        let catalogs = Catalogs::fetch(provider, &snapshot.pools).await;
        let (candidates, _events) = classify(&snapshot, &catalogs, cluster, clock);

        // Every commanded node must still classify; a veto pod landing or a
        // catalog going unhealthy mid-TTL surfaces as a missing candidate
        let mut fresh: Vec<&Candidate> = Vec::with_capacity(command.candidates.len());
        for id in &command.candidates {
            match candidates.iter().find(|c| &c.node.id == id) {
                Some(candidate) => fresh.push(candidate),
                None => {
                    debug!(node = %id, "candidate no longer classifies, dropping command");
                    return Ok(false);
                }
            }
        }

        match command.method {
            ConsolidationMethod::Empty => {
                // A pod landing on a previously empty node invalidates the batch
                Ok(fresh.iter().all(|c| c.is_empty()))
            }
            ConsolidationMethod::SingleNode | ConsolidationMethod::MultiNode => {
                if fresh.iter().any(|c| !c.evictable) {
                    debug!("a blocking disruption budget appeared mid-TTL, dropping command");
                    return Ok(false);
                }
                let ctx = EngineContext {
                    snapshot: &snapshot,
                    catalogs: &catalogs,
                    simulator,
                    recorder: &NoopRecorder,
                    clock,
                };
                let recomputed = compute_command(&ctx, &fresh, command.method)?;
                Ok(recomputed
                    .map(|c| c.is_equivalent(command))
                    .unwrap_or(false))
            }
        }
    }
}
