//! # Simulation Error Types
//!
//! Failures reported by a [`crate::SimulationStateAccessor`].

use thiserror::Error;

/// Errors that can occur while reading or mutating simulation state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// No body with that name is live.
    #[error("body not found: {0}")]
    UnknownBody(String),

    /// A body with that name is already live.
    #[error("body already exists: {0}")]
    DuplicateBody(String),

    /// The body belongs to the loaded scene and cannot be removed.
    #[error("body is permanent: {0}")]
    PermanentBody(String),

    /// A referenced resource (mesh, asset) is not available.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The descriptor is structurally invalid.
    #[error("invalid descriptor for {name}: {reason}")]
    InvalidDescriptor {
        /// Body name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A state slot does not resolve in the current structure version.
    #[error("state slot does not resolve: {0}")]
    UnknownSlot(String),
}

/// Result type for accessor operations.
pub type SimResult<T> = Result<T, SimError>;
