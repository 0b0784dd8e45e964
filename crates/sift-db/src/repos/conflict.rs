//! Conflict manager: open, discuss, escalate and resolve disagreements.
//!
//! At most one unresolved conflict exists per (study, phase); the partial
//! unique index `idx_conflicts_one_open` backs the check made here. A
//! conflict resolves exactly once (`conflict_resolutions.conflict_id` is
//! unique).

use chrono::Utc;
use serde::Serialize;

use sift_core::audit_detail::{ConflictOpenedDetail, EscalatedDetail, ResolvedDetail};
use sift_core::consensus::{self, Evaluation};
use sift_core::entities::{Conflict, ConflictResolution, Decision, Escalation, Study};
use sift_core::enums::{AuditAction, ConflictStatus, EntityType, FinalDecision, Phase, StudyStatus, Verdict};
use sift_core::ids::{PREFIX_CONFLICT, PREFIX_RESOLUTION};

use crate::error::{DatabaseError, EngineError, is_unique_violation_on};
use crate::helpers::{
    collect_rows, first_row, get_opt_string, parse_datetime, parse_enum, parse_json,
    parse_optional_datetime, to_json,
};
use crate::notify::EscalationNotice;
use crate::repos::decision::{
    ConsensusOutcome, decision_refs, decisions_for, state_detail, verdicts,
};
use crate::repos::project::{
    active_members, load_project, require_participant, require_resolver, require_screener,
};
use crate::repos::stats::{Counter, bump};
use crate::repos::study::{load_study, write_study_state};
use crate::retry::with_retry;
use crate::service::{Audit, SiftService};

const CONFLICT_COLS: &str = "id, project_id, study_id, phase, status, decisions, escalated_at, escalated_by, escalation_reason, created_at, resolved_at";
const RESOLUTION_COLS: &str = "id, conflict_id, resolver_id, final_decision, reasoning, created_at";
/// Columns of `idx_conflicts_one_open`.
const ONE_OPEN_CONFLICT: &str = "conflicts.study_id, conflicts.phase";
const ONE_RESOLUTION: &str = "conflict_resolutions.conflict_id";

fn row_to_conflict(row: &libsql::Row) -> Result<Conflict, DatabaseError> {
    let escalated_at = parse_optional_datetime(get_opt_string(row, 6)?.as_deref())?;
    let escalation = match (escalated_at, get_opt_string(row, 7)?) {
        (Some(escalated_at), Some(escalated_by)) => Some(Escalation {
            escalated_at,
            escalated_by,
            reason: get_opt_string(row, 8)?.unwrap_or_default(),
        }),
        _ => None,
    };
    Ok(Conflict {
        id: row.get(0)?,
        project_id: row.get(1)?,
        study_id: row.get(2)?,
        phase: parse_enum(&row.get::<String>(3)?)?,
        status: parse_enum(&row.get::<String>(4)?)?,
        decisions: parse_json(&row.get::<String>(5)?)?,
        escalation,
        created_at: parse_datetime(&row.get::<String>(9)?)?,
        resolved_at: parse_optional_datetime(get_opt_string(row, 10)?.as_deref())?,
    })
}

fn row_to_resolution(row: &libsql::Row) -> Result<ConflictResolution, DatabaseError> {
    Ok(ConflictResolution {
        id: row.get(0)?,
        conflict_id: row.get(1)?,
        resolver_id: row.get(2)?,
        final_decision: parse_enum(&row.get::<String>(3)?)?,
        reasoning: row.get(4)?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
    })
}

pub(crate) async fn load_conflict(
    conn: &libsql::Connection,
    id: &str,
) -> Result<Conflict, EngineError> {
    let rows = conn
        .query(&format!("SELECT {CONFLICT_COLS} FROM conflicts WHERE id = ?1"), [id])
        .await?;
    first_row(rows, row_to_conflict)
        .await?
        .ok_or_else(|| EngineError::not_found("conflict", id))
}

pub(crate) async fn find_open_conflict(
    conn: &libsql::Connection,
    study_id: &str,
    phase: Phase,
) -> Result<Option<Conflict>, EngineError> {
    let rows = conn
        .query(
            &format!(
                "SELECT {CONFLICT_COLS} FROM conflicts
                 WHERE study_id = ?1 AND phase = ?2 AND status <> 'resolved'"
            ),
            [study_id, phase.as_str()],
        )
        .await?;
    Ok(first_row(rows, row_to_conflict).await?)
}

async fn load_resolution(
    conn: &libsql::Connection,
    conflict_id: &str,
) -> Result<Option<ConflictResolution>, EngineError> {
    let rows = conn
        .query(
            &format!("SELECT {RESOLUTION_COLS} FROM conflict_resolutions WHERE conflict_id = ?1"),
            [conflict_id],
        )
        .await?;
    Ok(first_row(rows, row_to_resolution).await?)
}

/// Result of [`SiftService::resolve_conflict`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolveOutcome {
    pub conflict: Conflict,
    pub resolution: ConflictResolution,
    /// The study after the resolution was applied.
    pub study: Study,
}

impl SiftService {
    /// Open a conflict for `study` over `decisions` inside `tx` and move the
    /// study to CONFLICT.
    ///
    /// `ConflictAlreadyOpen` carries the existing conflict, whether it was
    /// found up front or surfaced by the unique index.
    pub(crate) async fn open_conflict_in(
        &self,
        tx: &libsql::Transaction,
        study: &Study,
        decisions: &[Decision],
        actor_id: Option<&str>,
    ) -> Result<Conflict, EngineError> {
        if let Some(existing) = find_open_conflict(tx, &study.id, study.phase).await? {
            return Err(EngineError::ConflictAlreadyOpen(Box::new(existing)));
        }
        if !study.status.can_transition_to(StudyStatus::Conflict) {
            return Err(EngineError::StudyNotOpen {
                study_id: study.id.clone(),
                status: study.status,
            });
        }

        let conflict = Conflict {
            id: self.db().generate_id(PREFIX_CONFLICT).await?,
            project_id: study.project_id.clone(),
            study_id: study.id.clone(),
            phase: study.phase,
            status: ConflictStatus::Pending,
            decisions: decisions.to_vec(),
            escalation: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        let inserted = tx
            .execute(
                "INSERT INTO conflicts (id, project_id, study_id, phase, status, decisions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                libsql::params![
                    conflict.id.as_str(),
                    conflict.project_id.as_str(),
                    conflict.study_id.as_str(),
                    conflict.phase.as_str(),
                    conflict.status.as_str(),
                    to_json(&conflict.decisions)?,
                    conflict.created_at.to_rfc3339()
                ],
            )
            .await;
        match inserted {
            Err(e) if is_unique_violation_on(&e, ONE_OPEN_CONFLICT) => {
                let existing = find_open_conflict(tx, &study.id, study.phase)
                    .await?
                    .ok_or(DatabaseError::NoResult)?;
                return Err(EngineError::ConflictAlreadyOpen(Box::new(existing)));
            }
            other => {
                other?;
            }
        }

        write_study_state(
            tx,
            &study.id,
            study.phase,
            StudyStatus::Conflict,
            FinalDecision::Undecided,
        )
        .await?;
        bump(tx, &study.project_id, study.phase, Counter::ConflictOpened).await?;

        let detail = ConflictOpenedDetail {
            study_id: study.id.clone(),
            phase: study.phase,
            decisions: decision_refs(decisions),
            result: state_detail(study.phase, StudyStatus::Conflict, FinalDecision::Undecided),
        };
        self.append_audit(
            tx,
            Audit::new(
                &study.project_id,
                EntityType::Conflict,
                &conflict.id,
                AuditAction::ConflictOpened,
            )
            .by(actor_id)
            .detail(&detail)?,
        )
        .await?;
        tracing::info!(conflict_id = %conflict.id, study_id = %study.id, phase = %study.phase, "conflict opened");
        Ok(conflict)
    }

    /// Route a disagreement to the conflict manager. Losing the open race
    /// joins the winner's conflict.
    pub(crate) async fn enter_conflict(
        &self,
        tx: &libsql::Transaction,
        study: &Study,
        decisions: &[Decision],
        actor_id: Option<&str>,
    ) -> Result<(Study, ConsensusOutcome), EngineError> {
        match self.open_conflict_in(tx, study, decisions, actor_id).await {
            Ok(conflict) => Ok((
                load_study(tx, &study.id).await?,
                ConsensusOutcome::ConflictOpened {
                    conflict_id: conflict.id,
                },
            )),
            Err(EngineError::ConflictAlreadyOpen(existing)) => {
                if study.status != StudyStatus::Conflict {
                    write_study_state(
                        tx,
                        &study.id,
                        study.phase,
                        StudyStatus::Conflict,
                        FinalDecision::Undecided,
                    )
                    .await?;
                }
                Ok((
                    load_study(tx, &study.id).await?,
                    ConsensusOutcome::ConflictJoined {
                        conflict_id: existing.id,
                    },
                ))
            }
            Err(e) => Err(e),
        }
    }

    /// Open a conflict for the study's current phase over the decisions
    /// recorded so far, on behalf of `actor_id`.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown study
    /// - `Forbidden` unless the actor is an active OWNER, LEAD or REVIEWER
    /// - `Validation` if the phase differs from the study's, fewer than two
    ///   decisions exist, or the recorded verdicts agree
    /// - `ConflictAlreadyOpen` carrying the open conflict
    pub async fn open_conflict(
        &self,
        study_id: &str,
        phase: Phase,
        actor_id: &str,
    ) -> Result<Conflict, EngineError> {
        let conflict = with_retry(self.retry_config(), "open_conflict", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self.open_conflict_for(&tx, study_id, phase, actor_id).await;
            self.finish(tx, result).await
        })
        .await?;
        Ok(conflict)
    }

    async fn open_conflict_for(
        &self,
        tx: &libsql::Transaction,
        study_id: &str,
        phase: Phase,
        actor_id: &str,
    ) -> Result<Conflict, EngineError> {
        let study = load_study(tx, study_id).await?;
        require_screener(tx, &study.project_id, actor_id).await?;
        if study.phase != phase {
            return Err(EngineError::Validation(format!(
                "study {study_id} is in phase {}, not {phase}",
                study.phase
            )));
        }
        let decisions = decisions_for(tx, study_id, phase).await?;
        if decisions.len() < 2 {
            return Err(EngineError::Validation(format!(
                "a conflict needs at least two decisions, study {study_id} has {}",
                decisions.len()
            )));
        }
        if consensus::evaluate(&verdicts(&decisions), decisions.len()) != Evaluation::Disagreement {
            return Err(EngineError::Validation(format!(
                "decisions on study {study_id} in phase {phase} agree; there is nothing to adjudicate"
            )));
        }
        self.open_conflict_in(tx, &study, &decisions, Some(actor_id))
            .await
    }

    /// Adjudicate a conflict. The resolution lands on the study with the
    /// same advance/finalize rule as a unanimous verdict.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown conflict
    /// - `Forbidden` unless the resolver is an active OWNER or LEAD
    /// - `ConflictAlreadyResolved` carrying the existing resolution
    /// - `Validation` for blank reasoning
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        resolver_id: &str,
        final_decision: Verdict,
        reasoning: &str,
    ) -> Result<ResolveOutcome, EngineError> {
        let outcome = with_retry(self.retry_config(), "resolve_conflict", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self
                .resolve_in(&tx, conflict_id, resolver_id, final_decision, reasoning)
                .await;
            self.finish(tx, result).await
        })
        .await?;

        tracing::info!(
            conflict_id,
            resolver_id,
            verdict = %final_decision,
            study_status = %outcome.study.status,
            "conflict resolved"
        );
        self.dispatch_after_commit().await;
        Ok(outcome)
    }

    async fn resolve_in(
        &self,
        tx: &libsql::Transaction,
        conflict_id: &str,
        resolver_id: &str,
        final_decision: Verdict,
        reasoning: &str,
    ) -> Result<ResolveOutcome, EngineError> {
        let conflict = load_conflict(tx, conflict_id).await?;
        require_resolver(tx, &conflict.project_id, resolver_id).await?;
        if let Some(existing) = load_resolution(tx, conflict_id).await? {
            return Err(EngineError::ConflictAlreadyResolved(Box::new(existing)));
        }
        if reasoning.trim().is_empty() {
            return Err(EngineError::Validation(
                "resolution reasoning must not be empty".into(),
            ));
        }

        let resolution = ConflictResolution {
            id: self.db().generate_id(PREFIX_RESOLUTION).await?,
            conflict_id: conflict_id.to_string(),
            resolver_id: resolver_id.to_string(),
            final_decision,
            reasoning: reasoning.trim().to_string(),
            created_at: Utc::now(),
        };
        let inserted = tx
            .execute(
                "INSERT INTO conflict_resolutions (id, conflict_id, resolver_id, final_decision, reasoning, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                libsql::params![
                    resolution.id.as_str(),
                    conflict_id,
                    resolver_id,
                    final_decision.as_str(),
                    resolution.reasoning.as_str(),
                    resolution.created_at.to_rfc3339()
                ],
            )
            .await;
        match inserted {
            Err(e) if is_unique_violation_on(&e, ONE_RESOLUTION) => {
                let existing = load_resolution(tx, conflict_id)
                    .await?
                    .ok_or(DatabaseError::NoResult)?;
                return Err(EngineError::ConflictAlreadyResolved(Box::new(existing)));
            }
            other => {
                other?;
            }
        }

        tx.execute(
            "UPDATE conflicts SET status = 'resolved', resolved_at = ?1 WHERE id = ?2",
            libsql::params![resolution.created_at.to_rfc3339(), conflict_id],
        )
        .await?;
        bump(tx, &conflict.project_id, conflict.phase, Counter::ConflictResolved).await?;

        let study = load_study(tx, &conflict.study_id).await?;
        let study = if study.status == StudyStatus::Conflict && study.phase == conflict.phase {
            let project = load_project(tx, &study.project_id).await?;
            let settlement = consensus::settle(&project, conflict.phase, final_decision);
            self.apply_settlement(
                tx,
                &study,
                settlement,
                &conflict.decisions,
                Some(resolver_id),
                false,
            )
            .await?
        } else {
            let skipped = EngineError::Inconsistent {
                study_id: study.id.clone(),
                detail: format!(
                    "resolved conflict {conflict_id} but study is {} at {}",
                    study.status, study.phase
                ),
            };
            tracing::warn!(error = %skipped, "study state left unchanged by resolution");
            study
        };

        let detail = ResolvedDetail {
            resolution_id: resolution.id.clone(),
            study_id: study.id.clone(),
            final_decision,
            decisions: decision_refs(&conflict.decisions),
            result: state_detail(study.phase, study.status, study.final_decision),
        };
        self.append_audit(
            tx,
            Audit::new(
                &conflict.project_id,
                EntityType::Conflict,
                conflict_id,
                AuditAction::Resolved,
            )
            .by(Some(resolver_id))
            .detail(&detail)?,
        )
        .await?;

        Ok(ResolveOutcome {
            conflict: load_conflict(tx, conflict_id).await?,
            resolution,
            study,
        })
    }

    /// Move a pending conflict into discussion. Repeating the call is a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` for non-members, `ConflictAlreadyResolved`.
    pub async fn start_discussion(
        &self,
        conflict_id: &str,
        user_id: &str,
    ) -> Result<Conflict, EngineError> {
        with_retry(self.retry_config(), "start_discussion", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self.discuss_in(&tx, conflict_id, user_id).await;
            self.finish(tx, result).await
        })
        .await
    }

    async fn discuss_in(
        &self,
        tx: &libsql::Transaction,
        conflict_id: &str,
        user_id: &str,
    ) -> Result<Conflict, EngineError> {
        let conflict = load_conflict(tx, conflict_id).await?;
        require_participant(tx, &conflict.project_id, user_id).await?;
        match conflict.status {
            ConflictStatus::InDiscussion => return Ok(conflict),
            ConflictStatus::Resolved => {
                let existing = load_resolution(tx, conflict_id)
                    .await?
                    .ok_or(DatabaseError::NoResult)?;
                return Err(EngineError::ConflictAlreadyResolved(Box::new(existing)));
            }
            ConflictStatus::Pending => {}
        }
        tx.execute(
            "UPDATE conflicts SET status = 'in_discussion' WHERE id = ?1",
            [conflict_id],
        )
        .await?;
        self.append_audit(
            tx,
            Audit::new(
                &conflict.project_id,
                EntityType::Conflict,
                conflict_id,
                AuditAction::DiscussionStarted,
            )
            .by(Some(user_id)),
        )
        .await?;
        load_conflict(tx, conflict_id).await
    }

    /// Record escalation metadata and notify every active member who can
    /// resolve conflicts. The conflict status does not change.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` for non-members, `Validation` for a blank
    /// reason, `ConflictAlreadyResolved`.
    pub async fn escalate_conflict(
        &self,
        conflict_id: &str,
        by_user_id: &str,
        reason: &str,
    ) -> Result<Conflict, EngineError> {
        if reason.trim().is_empty() {
            return Err(EngineError::Validation(
                "escalation reason must not be empty".into(),
            ));
        }
        let (conflict, notices) = with_retry(self.retry_config(), "escalate_conflict", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self.escalate_in(&tx, conflict_id, by_user_id, reason).await;
            self.finish(tx, result).await
        })
        .await?;

        for notice in &notices {
            if let Err(e) = self.notifier().notify_escalation(notice) {
                tracing::warn!(conflict_id, recipient = %notice.recipient, error = %e, "escalation notice failed");
            }
        }
        tracing::info!(conflict_id, escalated_by = by_user_id, notified = notices.len(), "conflict escalated");
        Ok(conflict)
    }

    async fn escalate_in(
        &self,
        tx: &libsql::Transaction,
        conflict_id: &str,
        by_user_id: &str,
        reason: &str,
    ) -> Result<(Conflict, Vec<EscalationNotice>), EngineError> {
        let conflict = load_conflict(tx, conflict_id).await?;
        require_participant(tx, &conflict.project_id, by_user_id).await?;
        if conflict.status == ConflictStatus::Resolved {
            let existing = load_resolution(tx, conflict_id)
                .await?
                .ok_or(DatabaseError::NoResult)?;
            return Err(EngineError::ConflictAlreadyResolved(Box::new(existing)));
        }

        let reason = reason.trim();
        tx.execute(
            "UPDATE conflicts SET escalated_at = ?1, escalated_by = ?2, escalation_reason = ?3 WHERE id = ?4",
            libsql::params![Utc::now().to_rfc3339(), by_user_id, reason, conflict_id],
        )
        .await?;

        let recipients: Vec<String> = active_members(tx, &conflict.project_id)
            .await?
            .into_iter()
            .filter(|m| m.role.can_resolve())
            .map(|m| m.user_id)
            .collect();
        self.append_audit(
            tx,
            Audit::new(
                &conflict.project_id,
                EntityType::Conflict,
                conflict_id,
                AuditAction::Escalated,
            )
            .by(Some(by_user_id))
            .detail(&EscalatedDetail {
                reason: reason.to_string(),
                notified: recipients.clone(),
            })?,
        )
        .await?;

        let notices = recipients
            .into_iter()
            .map(|recipient| EscalationNotice {
                project_id: conflict.project_id.clone(),
                conflict_id: conflict_id.to_string(),
                study_id: conflict.study_id.clone(),
                escalated_by: by_user_id.to_string(),
                reason: reason.to_string(),
                recipient,
            })
            .collect();
        Ok((load_conflict(tx, conflict_id).await?, notices))
    }

    /// # Errors
    ///
    /// `NotFound` if no conflict has this id.
    pub async fn get_conflict(&self, id: &str) -> Result<Conflict, EngineError> {
        let _gate = self.lock_reads().await;
        load_conflict(self.db().conn(), id).await
    }

    /// The resolution of a conflict, if it has one.
    pub async fn get_resolution(
        &self,
        conflict_id: &str,
    ) -> Result<Option<ConflictResolution>, EngineError> {
        let _gate = self.lock_reads().await;
        load_resolution(self.db().conn(), conflict_id).await
    }

    /// Unresolved conflicts of a project, oldest first.
    pub async fn list_open_conflicts(&self, project_id: &str) -> Result<Vec<Conflict>, EngineError> {
        let _gate = self.lock_reads().await;
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {CONFLICT_COLS} FROM conflicts
                     WHERE project_id = ?1 AND status <> 'resolved' ORDER BY created_at, rowid"
                ),
                [project_id],
            )
            .await?;
        Ok(collect_rows(rows, row_to_conflict).await?)
    }
}
