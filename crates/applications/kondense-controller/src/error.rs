//! Error types for the consolidation engine

use thiserror::Error;
use uuid::Uuid;

/// Consolidation result type
pub type Result<T> = std::result::Result<T, ConsolidationError>;

/// Errors that can occur while deriving or committing a command.
///
/// None of these are fatal: every failure is per-reconcile and the next tick
/// re-derives from scratch.
#[derive(Error, Debug)]
pub enum ConsolidationError {
    /// A collaborator seam failed
    #[error(transparent)]
    Core(#[from] kondense_core::CoreError),

    /// The executor queue did not accept the command; marks were rolled back
    /// and the next reconcile re-attempts
    #[error("executor queue rejected command {0}")]
    QueueRejected(Uuid),

    /// The reconcile was cancelled; no command was emitted and no state
    /// was mutated
    #[error("reconcile cancelled")]
    Cancelled,
}
