use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{Phase, Verdict};
use crate::errors::CoreError;

/// One reviewer's immutable verdict on one study in one phase.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Decision {
    pub id: String,
    pub project_id: String,
    pub study_id: String,
    pub reviewer_id: String,
    pub phase: Phase,
    pub verdict: Verdict,
    pub reasoning: Option<String>,
    pub exclusion_reason: Option<String>,
    pub confidence: Option<u32>,
    pub time_spent_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// A decision as submitted by a reviewer, before it is recorded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NewDecision {
    pub reviewer_id: String,
    pub verdict: Verdict,
    pub reasoning: Option<String>,
    pub exclusion_reason: Option<String>,
    pub confidence: Option<u32>,
    pub time_spent_ms: Option<u64>,
}

impl NewDecision {
    #[must_use]
    pub fn new(reviewer_id: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            reviewer_id: reviewer_id.into(),
            verdict,
            reasoning: None,
            exclusion_reason: None,
            confidence: None,
            time_spent_ms: None,
        }
    }

    #[must_use]
    pub fn exclude(reviewer_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            exclusion_reason: Some(reason.into()),
            ..Self::new(reviewer_id, Verdict::Exclude)
        }
    }

    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    #[must_use]
    pub const fn with_confidence(mut self, confidence: u32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// # Errors
    ///
    /// Returns `CoreError::Validation` when an exclusion has no reason, the
    /// confidence exceeds 100, or the reviewer ID is blank.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.reviewer_id.trim().is_empty() {
            return Err(CoreError::Validation("reviewer_id must not be empty".into()));
        }
        if self.verdict == Verdict::Exclude
            && self
                .exclusion_reason
                .as_deref()
                .is_none_or(|r| r.trim().is_empty())
        {
            return Err(CoreError::Validation(
                "exclusion_reason is required when the decision is exclude".into(),
            ));
        }
        if let Some(confidence) = self.confidence {
            if confidence > 100 {
                return Err(CoreError::Validation(format!(
                    "confidence must be within [0, 100], got {confidence}"
                )));
            }
        }
        Ok(())
    }
}
