//! Consensus evaluation over the decisions recorded for one study/phase.
//!
//! This is the single definition of what it means for a study to be settled.
//! Both the live submission path and the reconciliation sweeper call
//! [`evaluate`] and [`settle`]; neither re-derives the rules.
//!
//! Any disagreement among the required reviewers opens a conflict. There is
//! no majority vote, whatever `k` is.

use serde::{Deserialize, Serialize};

use crate::entities::Project;
use crate::enums::{FinalDecision, Phase, StudyStatus, Verdict};

/// Result of evaluating the decisions of one study/phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evaluation {
    /// Fewer decisions than required; the study keeps screening.
    Awaiting { recorded: usize, required: usize },
    /// Every required reviewer returned the same verdict.
    Unanimous { verdict: Verdict },
    /// At least two verdicts differ; a human lead must adjudicate.
    Disagreement,
}

/// Evaluate recorded verdicts against the required reviewer count `k`.
///
/// `required` is clamped to at least 1.
#[must_use]
pub fn evaluate(verdicts: &[Verdict], required: usize) -> Evaluation {
    let required = required.max(1);
    if verdicts.len() < required {
        return Evaluation::Awaiting {
            recorded: verdicts.len(),
            required,
        };
    }
    let first = verdicts[0];
    if verdicts.iter().all(|v| *v == first) {
        Evaluation::Unanimous { verdict: first }
    } else {
        Evaluation::Disagreement
    }
}

/// Evaluation used by the reconciliation sweeper.
///
/// Identical to [`evaluate`] unless fewer than `required` decisions exist and
/// nobody else is eligible to add one; then the decisions present are
/// evaluated as if they were the full set. The returned flag marks that
/// liveness override.
#[must_use]
pub fn evaluate_for_sweep(
    verdicts: &[Verdict],
    required: usize,
    remaining_eligible: usize,
) -> (Evaluation, bool) {
    match evaluate(verdicts, required) {
        Evaluation::Awaiting { recorded, .. } if recorded > 0 && remaining_eligible == 0 => {
            (evaluate(verdicts, recorded), true)
        }
        other => (other, false),
    }
}

/// How an agreed verdict lands on a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Settlement {
    /// Included before the project's last phase: re-enter screening at `to`.
    Advance { from: Phase, to: Phase },
    /// Terminal for this study at `phase`.
    Final { phase: Phase, verdict: Verdict },
}

impl Settlement {
    /// Study `(phase, status, final_decision)` after applying this settlement.
    #[must_use]
    pub const fn resulting_state(self) -> (Phase, StudyStatus, FinalDecision) {
        match self {
            Self::Advance { to, .. } => (to, StudyStatus::Pending, FinalDecision::Undecided),
            Self::Final { phase, verdict } => (
                phase,
                verdict.terminal_status(),
                FinalDecision::Finalized(verdict),
            ),
        }
    }

    /// Final includes at the last phase hand the study to ingestion.
    #[must_use]
    pub const fn signals_ingestion(self) -> bool {
        matches!(
            self,
            Self::Final {
                verdict: Verdict::Include,
                ..
            }
        )
    }

    #[must_use]
    pub const fn verdict(self) -> Verdict {
        match self {
            Self::Advance { .. } => Verdict::Include,
            Self::Final { verdict, .. } => verdict,
        }
    }
}

/// Apply the phase-advance-on-include rule for `project`.
#[must_use]
pub fn settle(project: &Project, phase: Phase, verdict: Verdict) -> Settlement {
    match (verdict, project.advance_target(phase)) {
        (Verdict::Include, Some(to)) => Settlement::Advance { from: phase, to },
        _ => Settlement::Final { phase, verdict },
    }
}
