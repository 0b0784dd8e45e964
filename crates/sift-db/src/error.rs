//! Error types for sift-db.
//!
//! [`DatabaseError`] covers raw storage failures. [`EngineError`] is the
//! taxonomy callers of the screening engine see; constraint violations raised
//! by libSQL are translated into it and never surface as `libsql::Error`.

use sift_core::entities::{Conflict, ConflictResolution};
use sift_core::enums::{Phase, StudyStatus};
use sift_core::errors::CoreError;
use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Whether the failure was a UNIQUE constraint (or unique index) violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::LibSql(e) if is_unique_violation(e))
    }

    /// Whether the failure was lock contention that a retry can clear.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::LibSql(e) if crate::retry::is_busy_error(e))
    }
}

/// Detect a UNIQUE constraint failure from its `SQLite` message.
#[must_use]
pub fn is_unique_violation(e: &libsql::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

/// Detect a UNIQUE failure on exactly the key `columns`, written the way
/// `SQLite` reports it (`"table.col_a, table.col_b"`).
///
/// A collision on any other key of the same table (the primary key
/// included) does not match.
#[must_use]
pub fn is_unique_violation_on(e: &libsql::Error, columns: &str) -> bool {
    let message = e.to_string();
    let needle = format!("UNIQUE constraint failed: {columns}");
    message.match_indices(&needle).any(|(at, _)| {
        !message[at + needle.len()..]
            .starts_with(|c: char| c == ',' || c == '_' || c == '.' || c.is_ascii_alphanumeric())
    })
}

/// Errors returned by screening engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Reviewer {reviewer_id} already decided study {study_id} in phase {phase}")]
    DuplicateDecision {
        study_id: String,
        reviewer_id: String,
        phase: Phase,
    },

    /// An open conflict already exists; carries it.
    #[error("Conflict {} is already open for study {} in phase {}", .0.id, .0.study_id, .0.phase)]
    ConflictAlreadyOpen(Box<Conflict>),

    /// The conflict already has a resolution; carries it.
    #[error("Conflict {} was already resolved as {}", .0.conflict_id, .0.final_decision)]
    ConflictAlreadyResolved(Box<ConflictResolution>),

    #[error("Study {study_id} is {status} and does not accept decisions")]
    StudyNotOpen {
        study_id: String,
        status: StudyStatus,
    },

    /// Persisted state disagrees with the decision records.
    #[error("Study {study_id} is inconsistent: {detail}")]
    Inconsistent { study_id: String, detail: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl EngineError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether the whole operation may be retried from the start.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Database(e) if e.is_busy())
    }
}

impl From<libsql::Error> for EngineError {
    fn from(e: libsql::Error) -> Self {
        Self::Database(DatabaseError::LibSql(e))
    }
}

impl From<CoreError> for EngineError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::InvalidTransition { .. } => Self::Validation(e.to_string()),
            CoreError::Other(e) => Self::Database(DatabaseError::Other(e)),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Database(DatabaseError::Other(e.into()))
    }
}
