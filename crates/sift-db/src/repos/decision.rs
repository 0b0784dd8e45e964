//! Decision store and the live consensus path.
//!
//! A submission is recorded and evaluated in one `BEGIN IMMEDIATE`
//! transaction: the decision insert, counters, audit entries and the study's
//! resulting state either all commit or none do.

use chrono::Utc;
use serde::Serialize;

use sift_core::audit_detail::{DecisionRef, FinalizedDetail, StudyStateDetail};
use sift_core::consensus::{self, Evaluation, Settlement};
use sift_core::entities::{Decision, NewDecision, Study};
use sift_core::enums::{AuditAction, EntityType, FinalDecision, Phase, StudyStatus, Verdict};
use sift_core::ids::PREFIX_DECISION;

use crate::error::{DatabaseError, EngineError, is_unique_violation_on};
use crate::helpers::{collect_rows, first_row, get_opt_int, parse_datetime, parse_enum};
use crate::repos::project::{load_project, require_screener};
use crate::repos::stats::{Counter, bump};
use crate::repos::study::{load_study, write_study_state};
use crate::retry::with_retry;
use crate::service::{Audit, SiftService};

/// Columns of the one-decision-per-reviewer-per-phase key.
const DECISION_KEY: &str = "decisions.study_id, decisions.reviewer_id, decisions.phase";

const DECISION_COLS: &str = "id, project_id, study_id, reviewer_id, phase, verdict, reasoning, exclusion_reason, confidence, time_spent_ms, created_at";

/// What a submission did to its study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsensusOutcome {
    /// Fewer than `required` decisions so far.
    AwaitingReviewers { recorded: usize, required: usize },
    /// Unanimous verdict, terminal for the study.
    Finalized { verdict: Verdict },
    /// Unanimous include before the last phase.
    Advanced { from: Phase, to: Phase },
    /// The verdicts disagree; a new conflict was opened.
    ConflictOpened { conflict_id: String },
    /// The verdicts disagree and a conflict was already open.
    ConflictJoined { conflict_id: String },
}

impl From<Settlement> for ConsensusOutcome {
    fn from(settlement: Settlement) -> Self {
        match settlement {
            Settlement::Advance { from, to } => Self::Advanced { from, to },
            Settlement::Final { verdict, .. } => Self::Finalized { verdict },
        }
    }
}

/// Result of [`SiftService::submit_decision`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitOutcome {
    pub decision: Decision,
    /// The study after consensus was applied.
    pub study: Study,
    pub outcome: ConsensusOutcome,
}

pub(crate) fn row_to_decision(row: &libsql::Row) -> Result<Decision, DatabaseError> {
    Ok(Decision {
        id: row.get(0)?,
        project_id: row.get(1)?,
        study_id: row.get(2)?,
        reviewer_id: row.get(3)?,
        phase: parse_enum(&row.get::<String>(4)?)?,
        verdict: parse_enum(&row.get::<String>(5)?)?,
        reasoning: row.get(6)?,
        exclusion_reason: row.get(7)?,
        confidence: get_opt_int(row, 8)?,
        time_spent_ms: get_opt_int(row, 9)?,
        created_at: parse_datetime(&row.get::<String>(10)?)?,
    })
}

/// Decisions for one study/phase in recording order.
pub(crate) async fn decisions_for(
    conn: &libsql::Connection,
    study_id: &str,
    phase: Phase,
) -> Result<Vec<Decision>, EngineError> {
    let rows = conn
        .query(
            &format!(
                "SELECT {DECISION_COLS} FROM decisions
                 WHERE study_id = ?1 AND phase = ?2 ORDER BY created_at, rowid"
            ),
            [study_id, phase.as_str()],
        )
        .await?;
    Ok(collect_rows(rows, row_to_decision).await?)
}

async fn find_decision(
    conn: &libsql::Connection,
    study_id: &str,
    reviewer_id: &str,
    phase: Phase,
) -> Result<Option<Decision>, EngineError> {
    let rows = conn
        .query(
            &format!(
                "SELECT {DECISION_COLS} FROM decisions
                 WHERE study_id = ?1 AND reviewer_id = ?2 AND phase = ?3"
            ),
            [study_id, reviewer_id, phase.as_str()],
        )
        .await?;
    Ok(first_row(rows, row_to_decision).await?)
}

pub(crate) fn decision_refs(decisions: &[Decision]) -> Vec<DecisionRef> {
    decisions
        .iter()
        .map(|d| DecisionRef {
            decision_id: d.id.clone(),
            reviewer_id: d.reviewer_id.clone(),
            verdict: d.verdict,
        })
        .collect()
}

pub(crate) fn verdicts(decisions: &[Decision]) -> Vec<Verdict> {
    decisions.iter().map(|d| d.verdict).collect()
}

pub(crate) const fn state_detail(
    phase: Phase,
    status: StudyStatus,
    final_decision: FinalDecision,
) -> StudyStateDetail {
    StudyStateDetail {
        phase,
        status,
        final_decision: final_decision.verdict(),
    }
}

fn duplicate(study_id: &str, reviewer_id: &str, phase: Phase) -> EngineError {
    EngineError::DuplicateDecision {
        study_id: study_id.to_string(),
        reviewer_id: reviewer_id.to_string(),
        phase,
    }
}

impl SiftService {
    /// Record a reviewer's decision for `study_id` at `phase` and apply
    /// consensus in the same transaction.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed decision or a phase the study is not in
    /// - `NotFound` for an unknown study
    /// - `Forbidden` if the reviewer is not an active screening member
    /// - `DuplicateDecision` if the reviewer already decided this study/phase
    /// - `StudyNotOpen` if the study is in conflict or finalized
    pub async fn submit_decision(
        &self,
        study_id: &str,
        phase: Phase,
        input: &NewDecision,
    ) -> Result<SubmitOutcome, EngineError> {
        input.validate()?;
        let outcome = with_retry(self.retry_config(), "submit_decision", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self.record_decision(&tx, study_id, phase, input).await;
            self.finish(tx, result).await
        })
        .await?;

        tracing::info!(
            study_id,
            reviewer_id = %input.reviewer_id,
            %phase,
            verdict = %input.verdict,
            outcome = ?outcome.outcome,
            "decision recorded"
        );
        self.dispatch_after_commit().await;
        Ok(outcome)
    }

    async fn record_decision(
        &self,
        tx: &libsql::Transaction,
        study_id: &str,
        phase: Phase,
        input: &NewDecision,
    ) -> Result<SubmitOutcome, EngineError> {
        let study = load_study(tx, study_id).await?;
        if study.phase != phase {
            return Err(EngineError::Validation(format!(
                "study {study_id} is in phase {}, not {phase}",
                study.phase
            )));
        }
        let project = load_project(tx, &study.project_id).await?;
        require_screener(tx, &project.id, &input.reviewer_id).await?;

        if find_decision(tx, study_id, &input.reviewer_id, phase)
            .await?
            .is_some()
        {
            return Err(duplicate(study_id, &input.reviewer_id, phase));
        }
        if !study.status.accepts_decisions() {
            return Err(EngineError::StudyNotOpen {
                study_id: study_id.to_string(),
                status: study.status,
            });
        }

        let decision = self.insert_decision(tx, &study, input).await?;
        let decisions = decisions_for(tx, study_id, phase).await?;
        let actor = Some(input.reviewer_id.as_str());

        let required = usize::try_from(project.required_reviewers).unwrap_or(usize::MAX);
        let (study, outcome) = match consensus::evaluate(&verdicts(&decisions), required) {
            Evaluation::Awaiting { recorded, required } => {
                if study.status == StudyStatus::Pending {
                    write_study_state(
                        tx,
                        study_id,
                        phase,
                        StudyStatus::Screening,
                        FinalDecision::Undecided,
                    )
                    .await?;
                }
                (
                    load_study(tx, study_id).await?,
                    ConsensusOutcome::AwaitingReviewers { recorded, required },
                )
            }
            Evaluation::Unanimous { verdict } => {
                let settlement = consensus::settle(&project, phase, verdict);
                let study = self
                    .apply_settlement(tx, &study, settlement, &decisions, actor, false)
                    .await?;
                (study, settlement.into())
            }
            Evaluation::Disagreement => self.enter_conflict(tx, &study, &decisions, actor).await?,
        };

        Ok(SubmitOutcome {
            decision,
            study,
            outcome,
        })
    }

    async fn insert_decision(
        &self,
        tx: &libsql::Transaction,
        study: &Study,
        input: &NewDecision,
    ) -> Result<Decision, EngineError> {
        let time_spent = input
            .time_spent_ms
            .map(i64::try_from)
            .transpose()
            .map_err(|_| EngineError::Validation("time_spent_ms is out of range".into()))?;

        let decision = Decision {
            id: self.db().generate_id(PREFIX_DECISION).await?,
            project_id: study.project_id.clone(),
            study_id: study.id.clone(),
            reviewer_id: input.reviewer_id.clone(),
            phase: study.phase,
            verdict: input.verdict,
            reasoning: input.reasoning.clone(),
            exclusion_reason: input.exclusion_reason.clone(),
            confidence: input.confidence,
            time_spent_ms: input.time_spent_ms,
            created_at: Utc::now(),
        };

        let inserted = tx
            .execute(
                "INSERT INTO decisions (id, project_id, study_id, reviewer_id, phase, verdict, reasoning,
                                        exclusion_reason, confidence, time_spent_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                libsql::params![
                    decision.id.as_str(),
                    decision.project_id.as_str(),
                    decision.study_id.as_str(),
                    decision.reviewer_id.as_str(),
                    decision.phase.as_str(),
                    decision.verdict.as_str(),
                    decision.reasoning.as_deref(),
                    decision.exclusion_reason.as_deref(),
                    decision.confidence.map(i64::from),
                    time_spent,
                    decision.created_at.to_rfc3339()
                ],
            )
            .await;
        match inserted {
            Err(e) if is_unique_violation_on(&e, DECISION_KEY) => {
                return Err(duplicate(&study.id, &decision.reviewer_id, study.phase));
            }
            other => {
                other?;
            }
        }

        bump(tx, &study.project_id, study.phase, Counter::Decision(decision.verdict)).await?;
        self.append_audit(
            tx,
            Audit::new(
                &study.project_id,
                EntityType::Decision,
                &decision.id,
                AuditAction::DecisionRecorded,
            )
            .by(Some(&decision.reviewer_id))
            .detail(&decision)?,
        )
        .await?;
        Ok(decision)
    }

    /// Land an agreed verdict on `study`: advance it or finalize it, count
    /// it, audit it and signal ingestion for final includes.
    ///
    /// Shared by the live path, conflict resolution and the sweeper.
    pub(crate) async fn apply_settlement(
        &self,
        tx: &libsql::Transaction,
        study: &Study,
        settlement: Settlement,
        decisions: &[Decision],
        actor_id: Option<&str>,
        liveness_override: bool,
    ) -> Result<Study, EngineError> {
        let (phase, status, final_decision) = settlement.resulting_state();
        if !study.status.can_transition_to(status) {
            return Err(EngineError::Inconsistent {
                study_id: study.id.clone(),
                detail: format!("cannot move from {} to {status}", study.status),
            });
        }
        write_study_state(tx, &study.id, phase, status, final_decision).await?;

        let (action, counter) = match settlement {
            Settlement::Advance { .. } => (AuditAction::Advanced, Counter::Advanced),
            Settlement::Final { .. } => (AuditAction::Finalized, Counter::Finalized),
        };
        bump(tx, &study.project_id, study.phase, counter).await?;

        let detail = FinalizedDetail {
            phase: study.phase,
            verdict: settlement.verdict(),
            decisions: decision_refs(decisions),
            from_status: study.status,
            result: state_detail(phase, status, final_decision),
            liveness_override,
        };
        self.append_audit(
            tx,
            Audit::new(&study.project_id, EntityType::Study, &study.id, action)
                .by(actor_id)
                .detail(&detail)?,
        )
        .await?;

        if settlement.signals_ingestion() {
            self.signal_ingestion(tx, &study.project_id, &study.id, phase, actor_id)
                .await?;
        }
        tracing::debug!(study_id = %study.id, ?settlement, "study settled");
        load_study(tx, &study.id).await
    }

    /// All decisions for a study, optionally restricted to one phase.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown study.
    pub async fn list_decisions(
        &self,
        study_id: &str,
        phase: Option<Phase>,
    ) -> Result<Vec<Decision>, EngineError> {
        let _gate = self.lock_reads().await;
        let conn = self.db().conn();
        load_study(conn, study_id).await?;
        if let Some(phase) = phase {
            return decisions_for(conn, study_id, phase).await;
        }
        let rows = conn
            .query(
                &format!(
                    "SELECT {DECISION_COLS} FROM decisions
                     WHERE study_id = ?1 ORDER BY created_at, rowid"
                ),
                [study_id],
            )
            .await?;
        Ok(collect_rows(rows, row_to_decision).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use crate::ingestion::MemoryIngestionQueue;
    use crate::test_support::helpers::{add_study, project_with_reviewers, test_service};

    use super::*;

    #[tokio::test]
    async fn first_decision_moves_study_to_screening() {
        let svc = test_service().await;
        let p = project_with_reviewers(&svc, 2, &["usr-a", "usr-b"]).await;
        let s = add_study(&svc, &p, "statins").await;

        let out = svc
            .submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::new("usr-a", Verdict::Include))
            .await
            .unwrap();
        assert_eq!(
            out.outcome,
            ConsensusOutcome::AwaitingReviewers {
                recorded: 1,
                required: 2
            }
        );
        assert_eq!(out.study.status, StudyStatus::Screening);
        assert_eq!(out.decision.phase, Phase::TitleAbstract);
    }

    #[tokio::test]
    async fn submit_outcome_matches_stored_state() {
        let svc = test_service().await;
        let p = project_with_reviewers(&svc, 2, &["usr-a", "usr-b"]).await;
        let s = add_study(&svc, &p, "statins").await;

        let out = svc
            .submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::new("usr-a", Verdict::Include))
            .await
            .unwrap();
        let stored = svc.list_decisions(&s.id, Some(Phase::TitleAbstract)).await.unwrap();
        let expected = SubmitOutcome {
            decision: stored[0].clone(),
            study: svc.get_study(&s.id).await.unwrap(),
            outcome: ConsensusOutcome::AwaitingReviewers {
                recorded: 1,
                required: 2,
            },
        };
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn unanimous_include_advances_to_next_phase() {
        let svc = test_service().await;
        let p = project_with_reviewers(&svc, 2, &["usr-a", "usr-b"]).await;
        let s = add_study(&svc, &p, "statins").await;

        for reviewer in ["usr-a", "usr-b"] {
            svc.submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::new(reviewer, Verdict::Include))
                .await
                .unwrap();
        }
        let study = svc.get_study(&s.id).await.unwrap();
        assert_eq!(study.phase, Phase::FullText);
        assert_eq!(study.status, StudyStatus::Pending);
        assert_eq!(study.final_decision, FinalDecision::Undecided);

        // Title/abstract decisions stay on record; the full-text phase starts clean.
        let all = svc.list_decisions(&s.id, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let ft = svc.list_decisions(&s.id, Some(Phase::FullText)).await.unwrap();
        assert!(ft.is_empty());
    }

    #[tokio::test]
    async fn final_include_signals_ingestion_once() {
        let queue = Arc::new(MemoryIngestionQueue::default());
        let svc = test_service().await.with_ingestion_queue(queue.clone());
        let p = project_with_reviewers(&svc, 1, &["usr-a"]).await;
        let s = add_study(&svc, &p, "statins").await;

        let ta = svc
            .submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::new("usr-a", Verdict::Include))
            .await
            .unwrap();
        assert_eq!(
            ta.outcome,
            ConsensusOutcome::Advanced {
                from: Phase::TitleAbstract,
                to: Phase::FullText
            }
        );
        assert!(queue.requests().is_empty());

        let ft = svc
            .submit_decision(&s.id, Phase::FullText, &NewDecision::new("usr-a", Verdict::Include))
            .await
            .unwrap();
        assert_eq!(ft.outcome, ConsensusOutcome::Finalized { verdict: Verdict::Include });
        assert_eq!(ft.study.status, StudyStatus::Included);
        assert_eq!(ft.study.final_decision, FinalDecision::Finalized(Verdict::Include));

        let requests = queue.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].study_id, s.id);
        assert_eq!(requests[0].phase, Phase::FullText);
    }

    #[tokio::test]
    async fn duplicate_decision_is_rejected_without_side_effects() {
        let svc = test_service().await;
        let p = project_with_reviewers(&svc, 2, &["usr-a", "usr-b"]).await;
        let s = add_study(&svc, &p, "statins").await;
        let input = NewDecision::new("usr-a", Verdict::Include);

        svc.submit_decision(&s.id, Phase::TitleAbstract, &input).await.unwrap();
        let err = svc
            .submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::exclude("usr-a", "changed my mind"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateDecision { .. }));

        let stats = svc.phase_stats(&p.id, Phase::TitleAbstract).await.unwrap();
        assert_eq!(stats.decisions, 1);
        assert_eq!(stats.excludes, 0);
    }

    #[tokio::test]
    async fn decision_key_violation_is_told_apart_from_id_collision() {
        let svc = test_service().await;
        let p = project_with_reviewers(&svc, 2, &["usr-a", "usr-b"]).await;
        let s = add_study(&svc, &p, "statins").await;
        let out = svc
            .submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::new("usr-a", Verdict::Include))
            .await
            .unwrap();

        let insert = "INSERT INTO decisions (id, project_id, study_id, reviewer_id, phase, verdict, created_at)
                      VALUES (?1, ?2, ?3, ?4, 'title_abstract', 'include', '2026-01-01T00:00:00+00:00')";
        let conn = svc.db().conn();
        let same_id = conn
            .execute(
                insert,
                libsql::params![out.decision.id.as_str(), p.id.as_str(), s.id.as_str(), "usr-b"],
            )
            .await
            .unwrap_err();
        assert!(!is_unique_violation_on(&same_id, DECISION_KEY));

        let same_key = conn
            .execute(
                insert,
                libsql::params!["dec-elsewhere", p.id.as_str(), s.id.as_str(), "usr-a"],
            )
            .await
            .unwrap_err();
        assert!(is_unique_violation_on(&same_key, DECISION_KEY));
    }

    #[tokio::test]
    async fn wrong_phase_and_observer_are_rejected() {
        let svc = test_service().await;
        let p = project_with_reviewers(&svc, 2, &["usr-a"]).await;
        svc.add_member(&p.id, "usr-obs", sift_core::enums::ProjectRole::Observer)
            .await
            .unwrap();
        let s = add_study(&svc, &p, "statins").await;

        let err = svc
            .submit_decision(&s.id, Phase::FullText, &NewDecision::new("usr-a", Verdict::Include))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = svc
            .submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::new("usr-obs", Verdict::Include))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));

        let err = svc
            .submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::new("usr-stranger", Verdict::Include))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[tokio::test]
    async fn exclude_without_reason_never_reaches_storage() {
        let svc = test_service().await;
        let p = project_with_reviewers(&svc, 1, &["usr-a"]).await;
        let s = add_study(&svc, &p, "statins").await;

        let err = svc
            .submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::new("usr-a", Verdict::Exclude))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(svc.list_decisions(&s.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn finalized_study_is_not_open() {
        let svc = test_service().await;
        let p = project_with_reviewers(&svc, 1, &["usr-a", "usr-b"]).await;
        let s = add_study(&svc, &p, "statins").await;

        let out = svc
            .submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::exclude("usr-a", "wrong population"))
            .await
            .unwrap();
        assert_eq!(out.outcome, ConsensusOutcome::Finalized { verdict: Verdict::Exclude });

        let err = svc
            .submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::new("usr-b", Verdict::Include))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::StudyNotOpen {
                status: StudyStatus::Excluded,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn settlement_audit_names_contributing_decisions() {
        let svc = test_service().await;
        let p = project_with_reviewers(&svc, 2, &["usr-a", "usr-b"]).await;
        let s = add_study(&svc, &p, "statins").await;

        svc.submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::exclude("usr-a", "adults only"))
            .await
            .unwrap();
        svc.submit_decision(&s.id, Phase::TitleAbstract, &NewDecision::exclude("usr-b", "adults only"))
            .await
            .unwrap();

        let entries = svc
            .query_audit(&crate::repos::audit::AuditFilter {
                entity_id: Some(s.id.clone()),
                action: Some(AuditAction::Finalized),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        let detail: FinalizedDetail =
            serde_json::from_value(entries[0].detail.clone().unwrap()).unwrap();
        assert_eq!(detail.verdict, Verdict::Exclude);
        assert_eq!(detail.decisions.len(), 2);
        assert_eq!(detail.result.status, StudyStatus::Excluded);
        assert!(!detail.liveness_override);
    }
}
