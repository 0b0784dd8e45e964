use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Decision;
use crate::enums::{ConflictStatus, Phase, Verdict};

/// A materialized disagreement among the required reviewers of a study/phase.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Conflict {
    pub id: String,
    pub project_id: String,
    pub study_id: String,
    pub phase: Phase,
    pub status: ConflictStatus,
    /// Snapshot of the disagreeing decisions at detection time.
    pub decisions: Vec<Decision>,
    pub escalation: Option<Escalation>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Informational escalation metadata; does not change conflict status.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Escalation {
    pub escalated_at: DateTime<Utc>,
    pub escalated_by: String,
    pub reason: String,
}

/// Terminal record of how a conflict was settled.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ConflictResolution {
    pub id: String,
    pub conflict_id: String,
    pub resolver_id: String,
    pub final_decision: Verdict,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}
