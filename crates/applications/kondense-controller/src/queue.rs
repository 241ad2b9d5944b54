//! Executor interface
//!
//! The engine never drains or terminates anything itself. Committed commands
//! go into a bounded channel consumed by the external drain/terminate
//! worker; at enqueue time every candidate is flagged as departing in the
//! cluster model so the very next decision sees that capacity as gone. If
//! the executor side cannot accept the command, the marks are rolled back
//! and the next reconcile re-attempts.

use std::sync::Arc;

use kondense_core::{ClusterState, Command};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{ConsolidationError, Result};

/// Default depth of the executor channel
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

pub struct CommandQueue {
    tx: mpsc::Sender<Command>,
    cluster: Arc<dyn ClusterState>,
}

impl CommandQueue {
    /// Create the queue and the receiver handed to the executor worker
    pub fn new(
        cluster: Arc<dyn ClusterState>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, cluster }, rx)
    }

    /// Hand a committed command to the executor, exactly once.
    ///
    /// Candidates are marked for deletion before the send so no concurrent
    /// decision can schedule onto them; a rejected send unmarks them again.
    pub fn enqueue(&self, command: Command) -> Result<()> {
        for node in &command.candidates {
            self.cluster.mark_for_deletion(node);
        }
        match self.tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(err) => {
                let command = match err {
                    mpsc::error::TrySendError::Full(c) => {
                        warn!("executor queue full, rolling back deletion marks");
                        c
                    }
                    mpsc::error::TrySendError::Closed(c) => {
                        warn!("executor queue closed, rolling back deletion marks");
                        c
                    }
                };
                for node in &command.candidates {
                    self.cluster.unmark_for_deletion(node);
                }
                Err(ConsolidationError::QueueRejected(command.id))
            }
        }
    }
}
