use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{Phase, ProjectRole};

/// A systematic-review project.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Independent decisions required before a study is settled (`k`).
    pub required_reviewers: u32,
    /// Phase at which an include is final and ingestion is signaled.
    pub last_phase: Phase,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Where an included study goes next, or `None` if `phase` is final for this project.
    #[must_use]
    pub fn advance_target(&self, phase: Phase) -> Option<Phase> {
        if phase < self.last_phase {
            phase.next()
        } else {
            None
        }
    }
}

/// A user's membership in a project.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Member {
    pub project_id: String,
    pub user_id: String,
    pub role: ProjectRole,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}
