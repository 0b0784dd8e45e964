use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{CalibrationStatus, Phase, Verdict};
use crate::errors::CoreError;

/// Allowed calibration sample sizes.
pub const SAMPLE_SIZE_RANGE: std::ops::RangeInclusive<u32> = 10..=100;

/// Allowed target kappa values.
pub const TARGET_AGREEMENT_RANGE: std::ops::RangeInclusive<f64> = 0.5..=1.0;

/// A bounded trial screening exercise over a fixed sample.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CalibrationRound {
    pub id: String,
    pub project_id: String,
    pub phase: Phase,
    pub sample_size: u32,
    pub target_agreement: f64,
    pub status: CalibrationStatus,
    pub kappa_score: Option<f64>,
    pub reviewers_participated: u32,
    pub participants: Vec<String>,
    pub study_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CalibrationRound {
    /// Advisory pass/fail. `None` until the round is completed with a defined kappa.
    #[must_use]
    pub fn passed(&self) -> Option<bool> {
        match (self.status, self.kappa_score) {
            (CalibrationStatus::Completed, Some(kappa)) => Some(kappa >= self.target_agreement),
            _ => None,
        }
    }

    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the sample size or target agreement
    /// is out of range.
    pub fn validate_parameters(sample_size: u32, target_agreement: f64) -> Result<(), CoreError> {
        if !SAMPLE_SIZE_RANGE.contains(&sample_size) {
            return Err(CoreError::Validation(format!(
                "sample_size must be within [{}, {}], got {sample_size}",
                SAMPLE_SIZE_RANGE.start(),
                SAMPLE_SIZE_RANGE.end()
            )));
        }
        if !TARGET_AGREEMENT_RANGE.contains(&target_agreement) {
            return Err(CoreError::Validation(format!(
                "target_agreement must be within [{}, {}], got {target_agreement}",
                TARGET_AGREEMENT_RANGE.start(),
                TARGET_AGREEMENT_RANGE.end()
            )));
        }
        Ok(())
    }
}

/// A calibration verdict, tracked apart from production decisions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CalibrationDecision {
    pub id: String,
    pub round_id: String,
    pub study_id: String,
    pub reviewer_id: String,
    pub verdict: Verdict,
    pub reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
}
