//! Reconciliation sweeper.
//!
//! Finds open studies whose recorded decisions already settle them and
//! applies the same consensus rules the live path uses. Each study is
//! reconciled in its own short `BEGIN IMMEDIATE` transaction that re-reads
//! the study first, so a sweep racing live submissions either observes the
//! winner's state or does the work itself, never both. Running it twice is
//! a no-op.
//!
//! When fewer than `k` decisions exist and no other active screening member
//! could still add one, the decisions present are evaluated as the full set.
//! That liveness override is logged at `warn` and recorded in the audit
//! detail.

use std::collections::HashSet;

use serde::Serialize;

use sift_core::audit_detail::ReconciledDetail;
use sift_core::consensus::{self, Evaluation, Settlement};
use sift_core::entities::{Decision, Study};
use sift_core::enums::{AuditAction, EntityType, FinalDecision, StudyStatus};

use crate::error::EngineError;
use crate::helpers::collect_rows;
use crate::repos::decision::{ConsensusOutcome, decisions_for, state_detail, verdicts};
use crate::repos::project::{active_members, load_project};
use crate::repos::study::{load_study, write_study_state};
use crate::retry::with_retry;
use crate::service::{Audit, SiftService};

/// Totals of one sweep run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Open studies with at least one decision in their current phase.
    pub scanned: usize,
    pub finalized: usize,
    pub advanced: usize,
    pub conflicts_opened: usize,
    /// Pending studies with decisions moved to SCREENING.
    pub marked_screening: usize,
    /// Settlements made with fewer than `k` decisions.
    pub liveness_overrides: usize,
    /// Studies whose reconciliation failed; logged and left for the next run.
    pub failed: usize,
    pub ingestion_dispatched: usize,
}

/// What reconciling one study did.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Repair {
    Unchanged,
    MarkedScreening,
    Settled {
        settlement: Settlement,
        liveness_override: bool,
    },
    Conflict,
}

impl SweepReport {
    fn record(&mut self, repair: &Repair) {
        match repair {
            Repair::Unchanged => {}
            Repair::MarkedScreening => self.marked_screening += 1,
            Repair::Settled {
                settlement,
                liveness_override,
            } => {
                match settlement {
                    Settlement::Advance { .. } => self.advanced += 1,
                    Settlement::Final { .. } => self.finalized += 1,
                }
                if *liveness_override {
                    self.liveness_overrides += 1;
                }
            }
            Repair::Conflict => self.conflicts_opened += 1,
        }
    }
}

fn study_id_of(row: &libsql::Row) -> Result<String, crate::error::DatabaseError> {
    Ok(row.get(0)?)
}

impl SiftService {
    /// Reconcile open studies, optionally restricted to one project, then
    /// dispatch any undelivered ingestion signals.
    ///
    /// # Errors
    ///
    /// Storage errors while listing candidates or dispatching. Failures on
    /// individual studies are logged and counted in [`SweepReport::failed`].
    pub async fn sweep(&self, project_id: Option<&str>) -> Result<SweepReport, EngineError> {
        let base = "SELECT DISTINCT s.id, s.created_at, s.rowid FROM studies s
                    JOIN decisions d ON d.study_id = s.id AND d.phase = s.phase
                    WHERE s.status IN ('pending', 'screening')";
        let gate = self.lock_reads().await;
        let rows = match project_id {
            Some(project_id) => {
                self.db()
                    .conn()
                    .query(
                        &format!("{base} AND s.project_id = ?1 ORDER BY s.created_at, s.rowid"),
                        [project_id],
                    )
                    .await?
            }
            None => {
                self.db()
                    .conn()
                    .query(&format!("{base} ORDER BY s.created_at, s.rowid"), ())
                    .await?
            }
        };
        let candidates = collect_rows(rows, study_id_of).await?;
        drop(gate);

        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };
        for study_id in &candidates {
            let id = study_id.as_str();
            let result = with_retry(self.retry_config(), "reconcile_study", || async move {
                let (_gate, tx) = self.begin_write().await?;
                let result = self.reconcile_study(&tx, id).await;
                self.finish(tx, result).await
            })
            .await;
            match result {
                Ok(repair) => report.record(&repair),
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(study_id = id, error = %e, "reconciliation failed");
                }
            }
        }

        report.ingestion_dispatched = self.dispatch_pending_ingestion().await?;
        tracing::info!(
            scanned = report.scanned,
            finalized = report.finalized,
            advanced = report.advanced,
            conflicts_opened = report.conflicts_opened,
            liveness_overrides = report.liveness_overrides,
            failed = report.failed,
            "sweep finished"
        );
        Ok(report)
    }

    async fn reconcile_study(
        &self,
        tx: &libsql::Transaction,
        study_id: &str,
    ) -> Result<Repair, EngineError> {
        let study = load_study(tx, study_id).await?;
        if !study.status.accepts_decisions() {
            return Ok(Repair::Unchanged);
        }
        let decisions = decisions_for(tx, study_id, study.phase).await?;
        if decisions.is_empty() {
            return Ok(Repair::Unchanged);
        }
        let project = load_project(tx, &study.project_id).await?;
        let required = usize::try_from(project.required_reviewers).unwrap_or(usize::MAX);
        let remaining = self.remaining_eligible(tx, &study, &decisions).await?;
        let (evaluation, liveness_override) =
            consensus::evaluate_for_sweep(&verdicts(&decisions), required, remaining);

        let before = state_detail(study.phase, study.status, study.final_decision);
        let (repair, reason) = match evaluation {
            Evaluation::Awaiting { .. } if study.status == StudyStatus::Pending => {
                write_study_state(
                    tx,
                    study_id,
                    study.phase,
                    StudyStatus::Screening,
                    FinalDecision::Undecided,
                )
                .await?;
                (
                    Repair::MarkedScreening,
                    format!("{} decision(s) recorded while pending", decisions.len()),
                )
            }
            Evaluation::Awaiting { .. } => return Ok(Repair::Unchanged),
            Evaluation::Unanimous { verdict } => {
                if liveness_override {
                    tracing::warn!(
                        study_id,
                        phase = %study.phase,
                        recorded = decisions.len(),
                        required,
                        "no eligible reviewers left; settling with the decisions present"
                    );
                }
                let settlement = consensus::settle(&project, study.phase, verdict);
                self.apply_settlement(tx, &study, settlement, &decisions, None, liveness_override)
                    .await?;
                (
                    Repair::Settled {
                        settlement,
                        liveness_override,
                    },
                    format!("{} decision(s) agree on {verdict}", decisions.len()),
                )
            }
            Evaluation::Disagreement => {
                let (_, outcome) = self.enter_conflict(tx, &study, &decisions, None).await?;
                let reason = match outcome {
                    ConsensusOutcome::ConflictJoined { conflict_id } => {
                        format!("study rejoined open conflict {conflict_id}")
                    }
                    _ => format!("{} decision(s) disagree", decisions.len()),
                };
                (Repair::Conflict, reason)
            }
        };

        let after = load_study(tx, study_id).await?;
        let repaired = EngineError::Inconsistent {
            study_id: study_id.to_string(),
            detail: reason.clone(),
        };
        tracing::warn!(error = %repaired, to = %after.status, "study reconciled");
        self.append_audit(
            tx,
            Audit::new(&study.project_id, EntityType::Study, study_id, AuditAction::Reconciled)
                .detail(&ReconciledDetail {
                    from: before,
                    to: state_detail(after.phase, after.status, after.final_decision),
                    reason,
                })?,
        )
        .await?;
        Ok(repair)
    }

    /// Active screening members who have not decided `study` in its phase.
    async fn remaining_eligible(
        &self,
        tx: &libsql::Transaction,
        study: &Study,
        decisions: &[Decision],
    ) -> Result<usize, EngineError> {
        let decided: HashSet<&str> = decisions.iter().map(|d| d.reviewer_id.as_str()).collect();
        Ok(active_members(tx, &study.project_id)
            .await?
            .iter()
            .filter(|m| m.role.can_screen() && !decided.contains(m.user_id.as_str()))
            .count())
    }
}
