//! Reconcile orchestration
//!
//! One reconcile runs the strategies in a fixed order against one immutable
//! snapshot:
//!
//! ```text
//! IDLE → CLASSIFY → EMPTY → (committed ? IDLE : MULTI)
//!                         → (committed ? IDLE : SINGLE) → IDLE
//! ```
//!
//! Each strategy gets a wall-clock budget through the clock abstraction, and
//! every proposed command passes the validation gate before it reaches the
//! executor queue. The cancellation token is honored at strategy boundaries
//! and on wake from the validation sleep; a cancelled reconcile leaves no
//! partial commands and no deletion marks.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kondense_core::{
    Clock, CloudProvider, ClusterState, Command, ConsolidationMethod, DisruptionAction,
    DisruptionEvent, EventRecorder, SchedulingSimulator,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::candidates::{build_snapshot, classify, Catalogs};
use crate::consolidation::EngineContext;
use crate::empty::compute_empty_command;
use crate::error::{ConsolidationError, Result};
use crate::multi::compute_multi_command;
use crate::queue::CommandQueue;
use crate::single::SingleNodeConsolidation;
use crate::validate::ValidationGate;

/// Stabilization delay between proposing and committing a command
pub const DEFAULT_VALIDATION_TTL: Duration = Duration::from_secs(15);

/// Wall-clock budget for the multi-node binary search
pub const DEFAULT_MULTI_NODE_TIMEOUT: Duration = Duration::from_secs(60);

/// Wall-clock budget for the single-node walk
pub const DEFAULT_SINGLE_NODE_TIMEOUT: Duration = Duration::from_secs(180);

/// Tunables for the consolidation engine
#[derive(Debug, Clone)]
pub struct ConsolidationConfig {
    pub validation_ttl: Duration,
    pub multi_node_timeout: Duration,
    pub single_node_timeout: Duration,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            validation_ttl: DEFAULT_VALIDATION_TTL,
            multi_node_timeout: DEFAULT_MULTI_NODE_TIMEOUT,
            single_node_timeout: DEFAULT_SINGLE_NODE_TIMEOUT,
        }
    }
}

impl ConsolidationConfig {
    /// Set the validation TTL
    pub fn with_validation_ttl(mut self, ttl: Duration) -> Self {
        self.validation_ttl = ttl;
        self
    }

    /// Set the multi-node strategy budget
    pub fn with_multi_node_timeout(mut self, timeout: Duration) -> Self {
        self.multi_node_timeout = timeout;
        self
    }

    /// Set the single-node strategy budget
    pub fn with_single_node_timeout(mut self, timeout: Duration) -> Self {
        self.single_node_timeout = timeout;
        self
    }
}

/// What one reconcile pass concluded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    /// A command passed validation and was handed to the executor
    Committed(Command),
    /// Nothing worth disrupting this cycle
    NoAction,
}

/// Drives classification, the consolidation methods, validation and the
/// executor handoff. One instance per controller; `reconcile` is called
/// sequentially by the surrounding loop.
pub struct Orchestrator {
    cluster: Arc<dyn ClusterState>,
    provider: Arc<dyn CloudProvider>,
    simulator: Arc<dyn SchedulingSimulator>,
    recorder: Arc<dyn EventRecorder>,
    clock: Arc<dyn Clock>,
    queue: CommandQueue,
    config: ConsolidationConfig,
    gate: ValidationGate,
    single_node: SingleNodeConsolidation,
}

impl Orchestrator {
    pub fn new(
        cluster: Arc<dyn ClusterState>,
        provider: Arc<dyn CloudProvider>,
        simulator: Arc<dyn SchedulingSimulator>,
        recorder: Arc<dyn EventRecorder>,
        clock: Arc<dyn Clock>,
        queue: CommandQueue,
        config: ConsolidationConfig,
    ) -> Self {
        let gate = ValidationGate::new(config.validation_ttl);
        Self {
            cluster,
            provider,
            simulator,
            recorder,
            clock,
            queue,
            config,
            gate,
            single_node: SingleNodeConsolidation::new(),
        }
    }

    /// Run one reconcile pass: Empty → Multi → Single, first committed
    /// command wins.
    pub async fn reconcile(&mut self, cancel: &CancellationToken) -> Result<ReconcileOutcome> {
        if cancel.is_cancelled() {
            return Err(ConsolidationError::Cancelled);
        }

        let snapshot = build_snapshot(self.cluster.as_ref());
        let catalogs = Catalogs::fetch(self.provider.as_ref(), &snapshot.pools).await;
        let (candidates, events) = classify(
            &snapshot,
            &catalogs,
            self.cluster.as_ref(),
            self.clock.as_ref(),
        );
        for event in events {
            self.recorder.record(event);
        }
        if candidates.is_empty() {
            debug!("no disruption candidates this cycle");
            return Ok(ReconcileOutcome::NoAction);
        }
        debug!(candidates = candidates.len(), "classified disruption candidates");

        // Empty nodes first: cheapest command, no simulation
        if let Some(command) = compute_empty_command(&candidates) {
            if let Some(committed) = self.validate_and_commit(command, cancel).await? {
                return Ok(ReconcileOutcome::Committed(committed));
            }
        }
        if cancel.is_cancelled() {
            return Err(ConsolidationError::Cancelled);
        }

        // Multi-node: largest deletable prefix under its budget
        let ctx = EngineContext {
            snapshot: &snapshot,
            catalogs: &catalogs,
            simulator: self.simulator.as_ref(),
            recorder: self.recorder.as_ref(),
            clock: self.clock.as_ref(),
        };
        let deadline = deadline_after(self.clock.now(), self.config.multi_node_timeout);
        if let Some(command) = compute_multi_command(&ctx, &candidates, deadline)? {
            if let Some(committed) = self.validate_and_commit(command, cancel).await? {
                return Ok(ReconcileOutcome::Committed(committed));
            }
        }
        if cancel.is_cancelled() {
            return Err(ConsolidationError::Cancelled);
        }

        // Single-node: first valid candidate in cost order
        let ctx = EngineContext {
            snapshot: &snapshot,
            catalogs: &catalogs,
            simulator: self.simulator.as_ref(),
            recorder: self.recorder.as_ref(),
            clock: self.clock.as_ref(),
        };
        let deadline = deadline_after(self.clock.now(), self.config.single_node_timeout);
        if let Some(command) = self.single_node.compute(&ctx, &candidates, deadline)? {
            if let Some(committed) = self.validate_and_commit(command, cancel).await? {
                return Ok(ReconcileOutcome::Committed(committed));
            }
        }

        Ok(ReconcileOutcome::NoAction)
    }

    /// Run a proposed command through the validation gate and, if it holds,
    /// emit the committed event and hand it to the executor queue.
    async fn validate_and_commit(
        &self,
        command: Command,
        cancel: &CancellationToken,
    ) -> Result<Option<Command>> {
        info!(command = %command, "proposing command, validating after stabilization TTL");
        let valid = self
            .gate
            .validate(
                self.cluster.as_ref(),
                self.provider.as_ref(),
                self.simulator.as_ref(),
                self.clock.as_ref(),
                &command,
                cancel,
            )
            .await?;
        if !valid {
            debug!(command = %command, "command no longer valid after TTL, dropping");
            return Ok(None);
        }

        match (command.method, command.action) {
            (ConsolidationMethod::Empty, _) => {
                self.recorder.record(DisruptionEvent::DeletingEmptyNodes {
                    nodes: command.candidates.clone(),
                });
            }
            (_, DisruptionAction::Replace) => {
                let instance_types = command
                    .replacements
                    .first()
                    .map(|claim| {
                        claim
                            .requirements
                            .instance_types
                            .iter()
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                self.recorder.record(DisruptionEvent::Replacing {
                    nodes: command.candidates.clone(),
                    instance_types,
                });
            }
            _ => {}
        }

        self.queue.enqueue(command.clone())?;
        info!(command = %command, "command committed to executor queue");
        Ok(Some(command))
    }
}

fn deadline_after(now: DateTime<Utc>, budget: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(budget)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
