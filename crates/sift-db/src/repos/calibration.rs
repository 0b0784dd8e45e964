//! Calibration controller.
//!
//! A round samples unscreened studies and asks a fixed set of participants
//! to decide each one. Calibration decisions live in their own table and
//! never touch study state or screening counters. When every participant
//! has decided every sampled study the round completes with the average
//! pairwise kappa over the sample.

use chrono::Utc;

use sift_core::audit_detail::CalibrationCompletedDetail;
use sift_core::entities::{CalibrationDecision, CalibrationRound};
use sift_core::enums::{AuditAction, CalibrationStatus, EntityType, Phase, Verdict};
use sift_core::ids::{PREFIX_CALIBRATION, PREFIX_CALIBRATION_DECISION};
use sift_core::reliability::{KappaOptions, pairwise_report};

use crate::error::{DatabaseError, EngineError, is_unique_violation_on};
use crate::helpers::{
    collect_rows, first_row, get_int, parse_datetime, parse_enum, parse_optional_datetime,
};
use crate::repos::project::{active_members, load_project};
use crate::repos::reliability::{ratings_from, row_to_rating};
use crate::retry::with_retry;
use crate::service::{Audit, SiftService};

const ROUND_COLS: &str = "id, project_id, phase, sample_size, target_agreement, status, kappa_score, created_at, completed_at";
const CAL_DECISION_COLS: &str = "id, round_id, study_id, reviewer_id, verdict, reasoning, created_at";
/// Columns of `idx_calibration_one_unfinished`.
const ONE_UNFINISHED_ROUND: &str = "calibration_rounds.project_id, calibration_rounds.phase";
const CAL_DECISION_KEY: &str =
    "calibration_decisions.round_id, calibration_decisions.study_id, calibration_decisions.reviewer_id";

fn row_to_round(row: &libsql::Row) -> Result<CalibrationRound, DatabaseError> {
    Ok(CalibrationRound {
        id: row.get(0)?,
        project_id: row.get(1)?,
        phase: parse_enum(&row.get::<String>(2)?)?,
        sample_size: get_int(row, 3)?,
        target_agreement: row.get(4)?,
        status: parse_enum(&row.get::<String>(5)?)?,
        kappa_score: row.get(6)?,
        reviewers_participated: 0,
        participants: Vec::new(),
        study_ids: Vec::new(),
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        completed_at: parse_optional_datetime(row.get::<Option<String>>(8)?.as_deref())?,
    })
}

fn row_to_calibration_decision(row: &libsql::Row) -> Result<CalibrationDecision, DatabaseError> {
    Ok(CalibrationDecision {
        id: row.get(0)?,
        round_id: row.get(1)?,
        study_id: row.get(2)?,
        reviewer_id: row.get(3)?,
        verdict: parse_enum(&row.get::<String>(4)?)?,
        reasoning: row.get(5)?,
        created_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

fn first_string(row: &libsql::Row) -> Result<String, DatabaseError> {
    Ok(row.get(0)?)
}

/// Complete a row-level round with its participants, sample and
/// participation count.
async fn hydrate(
    conn: &libsql::Connection,
    mut round: CalibrationRound,
) -> Result<CalibrationRound, EngineError> {
    let rows = conn
        .query(
            "SELECT user_id FROM calibration_participants WHERE round_id = ?1 ORDER BY user_id",
            [round.id.as_str()],
        )
        .await?;
    round.participants = collect_rows(rows, first_string).await?;

    let rows = conn
        .query(
            "SELECT study_id FROM calibration_samples WHERE round_id = ?1 ORDER BY position",
            [round.id.as_str()],
        )
        .await?;
    round.study_ids = collect_rows(rows, first_string).await?;

    let rows = conn
        .query(
            "SELECT COUNT(DISTINCT reviewer_id) FROM calibration_decisions WHERE round_id = ?1",
            [round.id.as_str()],
        )
        .await?;
    round.reviewers_participated = first_row(rows, |row| get_int(row, 0))
        .await?
        .unwrap_or(0);
    Ok(round)
}

pub(crate) async fn load_round(
    conn: &libsql::Connection,
    id: &str,
) -> Result<CalibrationRound, EngineError> {
    let rows = conn
        .query(
            &format!("SELECT {ROUND_COLS} FROM calibration_rounds WHERE id = ?1"),
            [id],
        )
        .await?;
    let round = first_row(rows, row_to_round)
        .await?
        .ok_or_else(|| EngineError::not_found("calibration round", id))?;
    hydrate(conn, round).await
}

async fn count_rows(conn: &libsql::Connection, sql: &str, round_id: &str) -> Result<usize, EngineError> {
    let rows = conn.query(sql, [round_id]).await?;
    Ok(first_row(rows, |row| get_int(row, 0)).await?.unwrap_or(0))
}

impl SiftService {
    /// Start a calibration round over `sample_size` randomly drawn studies of
    /// `phase` that no reviewer has decided yet.
    ///
    /// Participants are the project's active screening members at this
    /// moment.
    ///
    /// # Errors
    ///
    /// - `Validation` for parameters out of range, fewer than two
    ///   participants, too few unscreened studies, or an unfinished round for
    ///   the same phase
    /// - `NotFound` for an unknown project
    pub async fn create_calibration_round(
        &self,
        project_id: &str,
        phase: Phase,
        sample_size: u32,
        target_agreement: f64,
    ) -> Result<CalibrationRound, EngineError> {
        CalibrationRound::validate_parameters(sample_size, target_agreement)?;
        let round = with_retry(self.retry_config(), "create_calibration_round", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self
                .insert_round(&tx, project_id, phase, sample_size, target_agreement)
                .await;
            self.finish(tx, result).await
        })
        .await?;
        tracing::info!(
            round_id = %round.id,
            project_id,
            %phase,
            sample_size,
            participants = round.participants.len(),
            "calibration round created"
        );
        Ok(round)
    }

    async fn insert_round(
        &self,
        tx: &libsql::Transaction,
        project_id: &str,
        phase: Phase,
        sample_size: u32,
        target_agreement: f64,
    ) -> Result<CalibrationRound, EngineError> {
        load_project(tx, project_id).await?;

        let participants: Vec<String> = active_members(tx, project_id)
            .await?
            .into_iter()
            .filter(|m| m.role.can_screen())
            .map(|m| m.user_id)
            .collect();
        if participants.len() < 2 {
            return Err(EngineError::Validation(format!(
                "calibration needs at least two active screening members, project {project_id} has {}",
                participants.len()
            )));
        }

        let rows = tx
            .query(
                "SELECT id FROM calibration_rounds
                 WHERE project_id = ?1 AND phase = ?2 AND status <> 'completed'",
                [project_id, phase.as_str()],
            )
            .await?;
        if let Some(open) = first_row(rows, first_string).await? {
            return Err(EngineError::Validation(format!(
                "calibration round {open} is still open for {phase}"
            )));
        }

        let rows = tx
            .query(
                "SELECT s.id FROM studies s
                 WHERE s.project_id = ?1 AND s.phase = ?2 AND s.status = 'pending'
                   AND NOT EXISTS (SELECT 1 FROM decisions d WHERE d.study_id = s.id AND d.phase = ?2)
                 ORDER BY RANDOM() LIMIT ?3",
                libsql::params![project_id, phase.as_str(), i64::from(sample_size)],
            )
            .await?;
        let sample = collect_rows(rows, first_string).await?;
        if sample.len() < sample_size as usize {
            return Err(EngineError::Validation(format!(
                "only {} unscreened studies in {phase}, sample_size is {sample_size}",
                sample.len()
            )));
        }

        let id = self.db().generate_id(PREFIX_CALIBRATION).await?;
        let now = Utc::now();
        let inserted = tx
            .execute(
                "INSERT INTO calibration_rounds (id, project_id, phase, sample_size, target_agreement, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                libsql::params![
                    id.as_str(),
                    project_id,
                    phase.as_str(),
                    i64::from(sample_size),
                    target_agreement,
                    CalibrationStatus::Pending.as_str(),
                    now.to_rfc3339()
                ],
            )
            .await;
        match inserted {
            Err(e) if is_unique_violation_on(&e, ONE_UNFINISHED_ROUND) => {
                return Err(EngineError::Validation(format!(
                    "a calibration round is already open for {phase}"
                )));
            }
            other => {
                other?;
            }
        }

        for (position, study_id) in sample.iter().enumerate() {
            tx.execute(
                "INSERT INTO calibration_samples (round_id, study_id, position) VALUES (?1, ?2, ?3)",
                libsql::params![id.as_str(), study_id.as_str(), i64::try_from(position).unwrap_or(i64::MAX)],
            )
            .await?;
        }
        for user_id in &participants {
            tx.execute(
                "INSERT INTO calibration_participants (round_id, user_id) VALUES (?1, ?2)",
                [id.as_str(), user_id.as_str()],
            )
            .await?;
        }

        let round = load_round(tx, &id).await?;
        self.append_audit(
            tx,
            Audit::new(project_id, EntityType::CalibrationRound, &id, AuditAction::Created)
                .detail(&round)?,
        )
        .await?;
        Ok(round)
    }

    /// Record one participant's verdict on a sampled study.
    ///
    /// Returns the round, completed with its kappa once the last expected
    /// decision arrives.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown round
    /// - `Forbidden` if the reviewer is not a participant
    /// - `Validation` if the study is not in the sample or the round is completed
    /// - `DuplicateDecision` if the reviewer already decided this study in the round
    pub async fn submit_calibration_decision(
        &self,
        round_id: &str,
        reviewer_id: &str,
        study_id: &str,
        verdict: Verdict,
        reasoning: Option<&str>,
    ) -> Result<CalibrationRound, EngineError> {
        let round = with_retry(self.retry_config(), "submit_calibration_decision", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self
                .record_calibration_decision(&tx, round_id, reviewer_id, study_id, verdict, reasoning)
                .await;
            self.finish(tx, result).await
        })
        .await?;
        if round.status == CalibrationStatus::Completed {
            tracing::info!(
                round_id,
                kappa = ?round.kappa_score,
                passed = ?round.passed(),
                "calibration round completed"
            );
        }
        Ok(round)
    }

    async fn record_calibration_decision(
        &self,
        tx: &libsql::Transaction,
        round_id: &str,
        reviewer_id: &str,
        study_id: &str,
        verdict: Verdict,
        reasoning: Option<&str>,
    ) -> Result<CalibrationRound, EngineError> {
        let round = load_round(tx, round_id).await?;
        if !round.participants.iter().any(|p| p == reviewer_id) {
            return Err(EngineError::Forbidden(format!(
                "{reviewer_id} is not a participant of calibration round {round_id}"
            )));
        }
        if round.status == CalibrationStatus::Completed {
            return Err(EngineError::Validation(format!(
                "calibration round {round_id} is already completed"
            )));
        }
        if !round.study_ids.iter().any(|s| s == study_id) {
            return Err(EngineError::Validation(format!(
                "study {study_id} is not part of calibration round {round_id}"
            )));
        }

        let decision = CalibrationDecision {
            id: self.db().generate_id(PREFIX_CALIBRATION_DECISION).await?,
            round_id: round_id.to_string(),
            study_id: study_id.to_string(),
            reviewer_id: reviewer_id.to_string(),
            verdict,
            reasoning: reasoning.map(str::trim).filter(|r| !r.is_empty()).map(String::from),
            created_at: Utc::now(),
        };
        let inserted = tx
            .execute(
                "INSERT INTO calibration_decisions (id, round_id, study_id, reviewer_id, verdict, reasoning, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                libsql::params![
                    decision.id.as_str(),
                    round_id,
                    study_id,
                    reviewer_id,
                    verdict.as_str(),
                    decision.reasoning.as_deref(),
                    decision.created_at.to_rfc3339()
                ],
            )
            .await;
        match inserted {
            Err(e) if is_unique_violation_on(&e, CAL_DECISION_KEY) => {
                return Err(EngineError::DuplicateDecision {
                    study_id: study_id.to_string(),
                    reviewer_id: reviewer_id.to_string(),
                    phase: round.phase,
                });
            }
            other => {
                other?;
            }
        }
        self.append_audit(
            tx,
            Audit::new(
                &round.project_id,
                EntityType::CalibrationRound,
                round_id,
                AuditAction::DecisionRecorded,
            )
            .by(Some(reviewer_id))
            .detail(&decision)?,
        )
        .await?;

        let recorded = count_rows(
            tx,
            "SELECT COUNT(*) FROM calibration_decisions WHERE round_id = ?1",
            round_id,
        )
        .await?;
        let expected = round.participants.len() * round.study_ids.len();

        if recorded < expected {
            if round.status == CalibrationStatus::Pending {
                tx.execute(
                    "UPDATE calibration_rounds SET status = 'in_progress' WHERE id = ?1",
                    [round_id],
                )
                .await?;
            }
            return load_round(tx, round_id).await;
        }

        self.complete_round(tx, &round).await
    }

    async fn complete_round(
        &self,
        tx: &libsql::Transaction,
        round: &CalibrationRound,
    ) -> Result<CalibrationRound, EngineError> {
        let rows = tx
            .query(
                "SELECT reviewer_id, study_id, verdict FROM calibration_decisions
                 WHERE round_id = ?1 ORDER BY reviewer_id, study_id",
                [round.id.as_str()],
            )
            .await?;
        let ratings = ratings_from(collect_rows(rows, row_to_rating).await?);
        let kappa = pairwise_report(&ratings, KappaOptions::default()).average_kappa;

        tx.execute(
            "UPDATE calibration_rounds SET status = 'completed', kappa_score = ?1, completed_at = ?2
             WHERE id = ?3",
            libsql::params![kappa, Utc::now().to_rfc3339(), round.id.as_str()],
        )
        .await?;

        let completed = load_round(tx, &round.id).await?;
        self.append_audit(
            tx,
            Audit::new(
                &round.project_id,
                EntityType::CalibrationRound,
                &round.id,
                AuditAction::CalibrationCompleted,
            )
            .detail(&CalibrationCompletedDetail {
                kappa,
                target_agreement: round.target_agreement,
                passed: completed.passed(),
            })?,
        )
        .await?;
        Ok(completed)
    }

    /// # Errors
    ///
    /// `NotFound` if no round has this id.
    pub async fn get_calibration_round(&self, id: &str) -> Result<CalibrationRound, EngineError> {
        let _gate = self.lock_reads().await;
        load_round(self.db().conn(), id).await
    }

    /// Calibration rounds of a project, oldest first.
    pub async fn list_calibration_rounds(
        &self,
        project_id: &str,
    ) -> Result<Vec<CalibrationRound>, EngineError> {
        let _gate = self.lock_reads().await;
        let conn = self.db().conn();
        let rows = conn
            .query(
                &format!(
                    "SELECT {ROUND_COLS} FROM calibration_rounds
                     WHERE project_id = ?1 ORDER BY created_at, rowid"
                ),
                [project_id],
            )
            .await?;
        let rounds = collect_rows(rows, row_to_round).await?;
        let mut out = Vec::with_capacity(rounds.len());
        for round in rounds {
            out.push(hydrate(conn, round).await?);
        }
        Ok(out)
    }

    /// Calibration decisions recorded in a round.
    pub async fn list_calibration_decisions(
        &self,
        round_id: &str,
    ) -> Result<Vec<CalibrationDecision>, EngineError> {
        let _gate = self.lock_reads().await;
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {CAL_DECISION_COLS} FROM calibration_decisions
                     WHERE round_id = ?1 ORDER BY created_at, rowid"
                ),
                [round_id],
            )
            .await?;
        Ok(collect_rows(rows, row_to_calibration_decision).await?)
    }
}
