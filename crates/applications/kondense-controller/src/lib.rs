//! # Kondense Controller
//!
//! Consolidation decision engine for a cluster autoscaler's disruption
//! controller: opportunistically deletes or replaces nodes to reduce cost
//! while proving, before anything is touched, that every workload still
//! schedules.
//!
//! ## Architecture
//!
//! ```text
//! ClusterState ──snapshot──► Classifier ──► Cost sort
//!                                              │
//!                             ┌────────────────┤
//!                             ▼                ▼
//!                       Empty / Multi / Single methods
//!                             │   (scheduler simulation + price filter)
//!                             ▼
//!                       Validation gate  (stabilization TTL, re-derive)
//!                             ▼
//!                       Executor queue   (mark-for-deletion + handoff)
//! ```
//!
//! The engine owns none of its collaborators: cluster state, the cloud
//! provider catalog, the scheduling simulator, the event recorder and the
//! clock all arrive as traits from `kondense-core`. Within a reconcile the
//! snapshot is immutable; the only write back into the cluster model is the
//! mark-for-deletion flag set at commit.
//!
//! ## Safety gates
//!
//! - do-not-disrupt / legacy annotations veto nodes and pods outright
//! - exhausted disruption budgets forbid commands that would evict
//! - replacements must be strictly cheaper in the worst permitted case
//! - commands never lean on non-initialized (in-flight) capacity
//! - every command is re-derived after a stabilization TTL before commit

pub mod candidates;
pub mod consolidation;
pub mod cost;
pub mod empty;
pub mod error;
pub mod multi;
pub mod orchestrator;
pub mod queue;
pub mod simulate;
pub mod single;
pub mod validate;

pub use candidates::{build_snapshot, classify, Candidate, Catalogs};
pub use consolidation::{compute_command, EngineContext};
pub use cost::{disruption_cost, lifetime_multiplier, pod_cost, BARE_POD_COST};
pub use empty::compute_empty_command;
pub use error::{ConsolidationError, Result};
pub use multi::{compute_multi_command, MAX_MULTI_CANDIDATES};
pub use orchestrator::{
    ConsolidationConfig, Orchestrator, ReconcileOutcome, DEFAULT_MULTI_NODE_TIMEOUT,
    DEFAULT_SINGLE_NODE_TIMEOUT, DEFAULT_VALIDATION_TTL,
};
pub use queue::{CommandQueue, DEFAULT_QUEUE_CAPACITY};
pub use simulate::{simulate_removal, SimulationOutcome};
pub use single::SingleNodeConsolidation;
pub use validate::ValidationGate;
