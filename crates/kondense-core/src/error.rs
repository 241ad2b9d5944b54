//! Error types shared across kondense components

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the collaborator seams
#[derive(Error, Debug)]
pub enum CoreError {
    /// Cloud provider call failed
    #[error("provider error: {0}")]
    Provider(String),

    /// A node pool currently exposes no usable instance-type catalog; its
    /// candidates are skipped for the cycle without failing other pools
    #[error("instance-type catalog unavailable for node pool {0}")]
    CatalogUnavailable(String),

    /// The scheduling simulator could not complete
    #[error("simulation error: {0}")]
    Simulation(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Create a provider error with the given message
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a simulation error with the given message
    pub fn simulation(msg: impl Into<String>) -> Self {
        Self::Simulation(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
