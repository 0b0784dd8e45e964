//! Entity structs for all Sift domain objects.
//!
//! Each entity maps to a table in the libSQL database. All structs derive
//! `Serialize`, `Deserialize`, and `JsonSchema` for JSON roundtrip and schema
//! validation.

mod audit;
mod calibration;
mod conflict;
mod decision;
mod project;
mod stats;
mod study;

pub use audit::AuditEntry;
pub use calibration::{CalibrationDecision, CalibrationRound};
pub use conflict::{Conflict, ConflictResolution, Escalation};
pub use decision::{Decision, NewDecision};
pub use project::{Member, Project};
pub use stats::PhaseStats;
pub use study::{AiAssessment, NewWork, Study, Work};
