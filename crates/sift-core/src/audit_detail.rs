//! Typed audit detail payloads.
//!
//! Each audit action carries a structured `detail` JSON blob. Finalize,
//! conflict-open and resolution entries record the triggering decisions and
//! the resulting study state.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{Phase, StudyStatus, Verdict};

/// Compact reference to a decision inside an audit payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DecisionRef {
    pub decision_id: String,
    pub reviewer_id: String,
    pub verdict: Verdict,
}

/// Resulting study state after a transition.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct StudyStateDetail {
    pub phase: Phase,
    pub status: StudyStatus,
    pub final_decision: Option<Verdict>,
}

/// Detail for `AuditAction::Finalized` and `AuditAction::Advanced`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FinalizedDetail {
    pub phase: Phase,
    pub verdict: Verdict,
    pub decisions: Vec<DecisionRef>,
    pub from_status: StudyStatus,
    pub result: StudyStateDetail,
    /// Set when the sweeper finalized with fewer decisions than required.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub liveness_override: bool,
}

/// Detail for `AuditAction::ConflictOpened`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ConflictOpenedDetail {
    pub study_id: String,
    pub phase: Phase,
    pub decisions: Vec<DecisionRef>,
    pub result: StudyStateDetail,
}

/// Detail for `AuditAction::Resolved`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ResolvedDetail {
    pub resolution_id: String,
    pub study_id: String,
    pub final_decision: Verdict,
    pub decisions: Vec<DecisionRef>,
    pub result: StudyStateDetail,
}

/// Detail for `AuditAction::Escalated`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EscalatedDetail {
    pub reason: String,
    pub notified: Vec<String>,
}

/// Detail for `AuditAction::Reconciled`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ReconciledDetail {
    pub from: StudyStateDetail,
    pub to: StudyStateDetail,
    pub reason: String,
}

/// Detail for `AuditAction::CalibrationCompleted`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CalibrationCompletedDetail {
    pub kappa: Option<f64>,
    pub target_agreement: f64,
    pub passed: Option<bool>,
}
