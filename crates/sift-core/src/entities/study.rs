use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{FinalDecision, Phase, StudyStatus, Verdict};
use crate::errors::CoreError;

/// One publication under review within one project.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Study {
    pub id: String,
    pub project_id: String,
    pub work_id: String,
    pub phase: Phase,
    pub status: StudyStatus,
    pub final_decision: FinalDecision,
    pub priority_score: u32,
    pub ai: Option<AiAssessment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Study {
    /// `final_decision` is set exactly when the status is terminal.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.final_decision.verdict().is_some() == self.status.is_terminal()
    }

    #[must_use]
    pub fn ai_confidence(&self) -> Option<f64> {
        self.ai.as_ref().map(|a| a.confidence)
    }
}

/// Machine triage attached to a study.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AiAssessment {
    pub suggestion: Verdict,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub reasoning: Option<String>,
}

impl AiAssessment {
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the confidence is outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(CoreError::Validation(format!(
                "ai confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Bibliographic snapshot of the publication behind a study.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Work {
    pub id: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub journal: Option<String>,
    pub publication_year: Option<i32>,
    pub keywords: Vec<String>,
}

/// Input for adding a study to a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NewWork {
    pub title: String,
    pub abstract_text: Option<String>,
    pub journal: Option<String>,
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl NewWork {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the title is blank.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::Validation("work title must not be empty".into()));
        }
        Ok(())
    }
}
