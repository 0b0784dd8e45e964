//! Cross-cutting error types for Sift.
//!
//! This module defines errors raised by the pure logic in `sift-core`.
//! Storage and engine-boundary errors (`DatabaseError`, `EngineError`) are
//! defined in `sift-db`, which converts these into its own taxonomy.

use thiserror::Error;

/// Errors that can be raised by any Sift crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        id: String,
        from: String,
        to: String,
    },

    /// Data failed validation (ranges, required fields).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
