use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Phase;

/// Materialized per-(project, phase) screening counters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PhaseStats {
    pub project_id: String,
    pub phase: Phase,
    pub decisions: i64,
    pub includes: i64,
    pub excludes: i64,
    pub maybes: i64,
    pub conflicts_opened: i64,
    pub conflicts_resolved: i64,
    pub finalized: i64,
    pub advanced: i64,
}

impl PhaseStats {
    /// All-zero counters for a phase with no activity yet.
    #[must_use]
    pub fn empty(project_id: &str, phase: Phase) -> Self {
        Self {
            project_id: project_id.to_string(),
            phase,
            decisions: 0,
            includes: 0,
            excludes: 0,
            maybes: 0,
            conflicts_opened: 0,
            conflicts_resolved: 0,
            finalized: 0,
            advanced: 0,
        }
    }
}
