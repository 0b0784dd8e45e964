//! Phases, statuses, verdicts, roles and actions for Sift.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.
//! Status enums with state machines provide `allowed_next_states()` to enforce
//! valid transitions at the application layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// A stage of the review pipeline.
///
/// ```text
/// title_abstract → full_text → final
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    TitleAbstract,
    FullText,
    Final,
}

impl Phase {
    /// The phase a study moves to when it is included here, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::TitleAbstract => Some(Self::FullText),
            Self::FullText => Some(Self::Final),
            Self::Final => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TitleAbstract => "title_abstract",
            Self::FullText => "full_text",
            Self::Final => "final",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// A reviewer's verdict on a study, and the final decision of a settled study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Include,
    Exclude,
    Maybe,
}

impl Verdict {
    pub const ALL: [Self; 3] = [Self::Include, Self::Exclude, Self::Maybe];

    /// The terminal study status matching this verdict.
    #[must_use]
    pub const fn terminal_status(self) -> StudyStatus {
        match self {
            Self::Include => StudyStatus::Included,
            Self::Exclude => StudyStatus::Excluded,
            Self::Maybe => StudyStatus::Maybe,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
            Self::Maybe => "maybe",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FinalDecision
// ---------------------------------------------------------------------------

/// Whether a study has been settled in its current phase.
///
/// Stored as a nullable `final_decision` column; in Rust the two states are
/// explicit so call sites never interpret `None` themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "state", content = "verdict", rename_all = "snake_case")]
pub enum FinalDecision {
    #[default]
    Undecided,
    Finalized(Verdict),
}

impl FinalDecision {
    #[must_use]
    pub const fn verdict(self) -> Option<Verdict> {
        match self {
            Self::Undecided => None,
            Self::Finalized(v) => Some(v),
        }
    }

    #[must_use]
    pub const fn from_column(verdict: Option<Verdict>) -> Self {
        match verdict {
            Some(v) => Self::Finalized(v),
            None => Self::Undecided,
        }
    }

    /// Column value for storage (`NULL` when undecided).
    #[must_use]
    pub const fn as_column(self) -> Option<&'static str> {
        match self {
            Self::Undecided => None,
            Self::Finalized(v) => Some(v.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// StudyStatus
// ---------------------------------------------------------------------------

/// Status of a study within its current phase.
///
/// ```text
/// pending → screening → conflict → (resolution) → included | excluded | maybe
///         ↘ included | excluded | maybe
/// any open status → pending        (phase advance on include)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StudyStatus {
    Pending,
    Screening,
    Conflict,
    Included,
    Excluded,
    Maybe,
}

impl StudyStatus {
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[
                Self::Pending,
                Self::Screening,
                Self::Conflict,
                Self::Included,
                Self::Excluded,
                Self::Maybe,
            ],
            Self::Screening => &[
                Self::Pending,
                Self::Screening,
                Self::Conflict,
                Self::Included,
                Self::Excluded,
                Self::Maybe,
            ],
            Self::Conflict => &[Self::Pending, Self::Included, Self::Excluded, Self::Maybe],
            Self::Included | Self::Excluded | Self::Maybe => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Whether new decisions may be recorded against a study in this status.
    #[must_use]
    pub const fn accepts_decisions(self) -> bool {
        matches!(self, Self::Pending | Self::Screening)
    }

    /// Whether this status carries a final decision.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Included | Self::Excluded | Self::Maybe)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Screening => "screening",
            Self::Conflict => "conflict",
            Self::Included => "included",
            Self::Excluded => "excluded",
            Self::Maybe => "maybe",
        }
    }
}

impl fmt::Display for StudyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConflictStatus
// ---------------------------------------------------------------------------

/// Status of a conflict.
///
/// ```text
/// pending → in_discussion → resolved
///         → resolved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Pending,
    InDiscussion,
    Resolved,
}

impl ConflictStatus {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::InDiscussion, Self::Resolved],
            Self::InDiscussion => &[Self::Resolved],
            Self::Resolved => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Resolved)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InDiscussion => "in_discussion",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CalibrationStatus
// ---------------------------------------------------------------------------

/// Status of a calibration round.
///
/// ```text
/// pending → in_progress → completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    Pending,
    InProgress,
    Completed,
}

impl CalibrationStatus {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Completed],
            Self::InProgress => &[Self::Completed],
            Self::Completed => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProjectRole
// ---------------------------------------------------------------------------

/// A member's role within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    Owner,
    Lead,
    Reviewer,
    Observer,
}

impl ProjectRole {
    /// May resolve conflicts and receives escalations.
    #[must_use]
    pub const fn can_resolve(self) -> bool {
        matches!(self, Self::Owner | Self::Lead)
    }

    /// May submit screening and calibration decisions.
    #[must_use]
    pub const fn can_screen(self) -> bool {
        !matches!(self, Self::Observer)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Lead => "lead",
            Self::Reviewer => "reviewer",
            Self::Observer => "observer",
        }
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// QueueStrategy
// ---------------------------------------------------------------------------

/// Ordering strategy for a reviewer's screening queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueueStrategy {
    #[default]
    Fifo,
    Priority,
    AiConfident,
    AiUncertain,
    Balanced,
    Random,
}

impl QueueStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::Priority => "priority",
            Self::AiConfident => "ai_confident",
            Self::AiUncertain => "ai_uncertain",
            Self::Balanced => "balanced",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for QueueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AuditAction
// ---------------------------------------------------------------------------

/// Action recorded in an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    DecisionRecorded,
    Finalized,
    Advanced,
    ConflictOpened,
    DiscussionStarted,
    Escalated,
    Resolved,
    Reconciled,
    Rescored,
    CalibrationCompleted,
    IngestionSignaled,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::DecisionRecorded => "decision_recorded",
            Self::Finalized => "finalized",
            Self::Advanced => "advanced",
            Self::ConflictOpened => "conflict_opened",
            Self::DiscussionStarted => "discussion_started",
            Self::Escalated => "escalated",
            Self::Resolved => "resolved",
            Self::Reconciled => "reconciled",
            Self::Rescored => "rescored",
            Self::CalibrationCompleted => "calibration_completed",
            Self::IngestionSignaled => "ingestion_signaled",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Entity kinds referenced by audit entries and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Project,
    Member,
    Study,
    Decision,
    Conflict,
    Resolution,
    CalibrationRound,
}

impl EntityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Member => "member",
            Self::Study => "study",
            Self::Decision => "decision",
            Self::Conflict => "conflict",
            Self::Resolution => "resolution",
            Self::CalibrationRound => "calibration_round",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- Serde roundtrip tests ---

    macro_rules! test_serde_roundtrip {
        ($name:ident, $ty:ty, $variant:expr, $expected_str:expr) => {
            #[test]
            fn $name() {
                let val = $variant;
                let json = serde_json::to_string(&val).unwrap();
                assert_eq!(json, format!("\"{}\"", $expected_str));
                let recovered: $ty = serde_json::from_str(&json).unwrap();
                assert_eq!(recovered, val);
            }
        };
    }

    test_serde_roundtrip!(phase_title_abstract, Phase, Phase::TitleAbstract, "title_abstract");
    test_serde_roundtrip!(phase_full_text, Phase, Phase::FullText, "full_text");
    test_serde_roundtrip!(verdict_exclude, Verdict, Verdict::Exclude, "exclude");
    test_serde_roundtrip!(
        conflict_in_discussion,
        ConflictStatus,
        ConflictStatus::InDiscussion,
        "in_discussion"
    );
    test_serde_roundtrip!(
        strategy_ai_uncertain,
        QueueStrategy,
        QueueStrategy::AiUncertain,
        "ai_uncertain"
    );
    test_serde_roundtrip!(
        action_conflict_opened,
        AuditAction,
        AuditAction::ConflictOpened,
        "conflict_opened"
    );

    #[test]
    fn as_str_matches_serde() {
        for status in [
            StudyStatus::Pending,
            StudyStatus::Screening,
            StudyStatus::Conflict,
            StudyStatus::Included,
            StudyStatus::Excluded,
            StudyStatus::Maybe,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn final_decision_serializes_tagged() {
        let json = serde_json::to_value(FinalDecision::Finalized(Verdict::Maybe)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "finalized", "verdict": "maybe"}));
        let json = serde_json::to_value(FinalDecision::Undecided).unwrap();
        assert_eq!(json, serde_json::json!({"state": "undecided"}));
    }

    #[test]
    fn final_decision_column_mapping() {
        assert_eq!(FinalDecision::Undecided.as_column(), None);
        assert_eq!(
            FinalDecision::Finalized(Verdict::Include).as_column(),
            Some("include")
        );
        assert_eq!(
            FinalDecision::from_column(Some(Verdict::Exclude)),
            FinalDecision::Finalized(Verdict::Exclude)
        );
    }

    // --- State machine tests ---

    #[test]
    fn phase_order_and_next() {
        assert!(Phase::TitleAbstract < Phase::FullText);
        assert!(Phase::FullText < Phase::Final);
        assert_eq!(Phase::TitleAbstract.next(), Some(Phase::FullText));
        assert_eq!(Phase::Final.next(), None);
    }

    #[test]
    fn study_terminal_states_have_no_exits() {
        for s in [StudyStatus::Included, StudyStatus::Excluded, StudyStatus::Maybe] {
            assert!(s.allowed_next_states().is_empty());
            assert!(s.is_terminal());
            assert!(!s.accepts_decisions());
        }
    }

    #[test]
    fn conflict_study_cannot_return_to_screening() {
        assert!(!StudyStatus::Conflict.can_transition_to(StudyStatus::Screening));
        assert!(StudyStatus::Conflict.can_transition_to(StudyStatus::Excluded));
        assert!(!StudyStatus::Conflict.accepts_decisions());
    }

    #[test]
    fn conflict_valid_transitions() {
        assert!(ConflictStatus::Pending.can_transition_to(ConflictStatus::InDiscussion));
        assert!(ConflictStatus::Pending.can_transition_to(ConflictStatus::Resolved));
        assert!(ConflictStatus::InDiscussion.can_transition_to(ConflictStatus::Resolved));
        assert!(!ConflictStatus::Resolved.can_transition_to(ConflictStatus::Pending));
        assert!(!ConflictStatus::InDiscussion.can_transition_to(ConflictStatus::Pending));
    }

    #[test]
    fn calibration_transitions() {
        assert!(CalibrationStatus::Pending.can_transition_to(CalibrationStatus::InProgress));
        assert!(CalibrationStatus::InProgress.can_transition_to(CalibrationStatus::Completed));
        assert!(!CalibrationStatus::Completed.can_transition_to(CalibrationStatus::InProgress));
    }

    #[test]
    fn role_capabilities() {
        assert!(ProjectRole::Owner.can_resolve());
        assert!(ProjectRole::Lead.can_resolve());
        assert!(!ProjectRole::Reviewer.can_resolve());
        assert!(ProjectRole::Reviewer.can_screen());
        assert!(!ProjectRole::Observer.can_screen());
    }

    #[test]
    fn verdict_terminal_status() {
        assert_eq!(Verdict::Include.terminal_status(), StudyStatus::Included);
        assert_eq!(Verdict::Exclude.terminal_status(), StudyStatus::Excluded);
        assert_eq!(Verdict::Maybe.terminal_status(), StudyStatus::Maybe);
    }
}
