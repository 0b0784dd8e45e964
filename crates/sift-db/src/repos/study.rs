//! Studies and their work metadata.
//!
//! Studies enter at TITLE_ABSTRACT/PENDING. Afterwards only the consensus
//! path, conflict resolution and the reconciliation sweeper change their
//! phase, status or final decision; this module owns the AI triage and
//! priority columns.

use chrono::{Datelike, Utc};

use sift_core::entities::{AiAssessment, NewWork, Study, Work};
use sift_core::enums::{AuditAction, EntityType, FinalDecision, Phase, StudyStatus};
use sift_core::ids::{PREFIX_STUDY, PREFIX_WORK};
use sift_core::priority::{self, PriorityCriteria};

use crate::error::{DatabaseError, EngineError};
use crate::helpers::{
    collect_rows, first_row, get_int, get_opt_int, get_opt_string, parse_datetime, parse_enum,
    parse_json, parse_optional_enum, to_json,
};
use crate::repos::project::load_project;
use crate::retry::with_retry;
use crate::service::{Audit, SiftService};

pub(crate) const STUDY_COLS: &str = "id, project_id, work_id, phase, status, final_decision, priority_score, ai_suggestion, ai_confidence, ai_reasoning, created_at, updated_at";

const WORK_COLS: &str = "id, title, abstract_text, journal, publication_year, keywords";

pub(crate) fn row_to_study(row: &libsql::Row) -> Result<Study, DatabaseError> {
    let final_decision = parse_optional_enum(get_opt_string(row, 5)?.as_deref())?;
    let suggestion = parse_optional_enum(get_opt_string(row, 7)?.as_deref())?;
    let confidence = row.get::<Option<f64>>(8)?;
    Ok(Study {
        id: row.get(0)?,
        project_id: row.get(1)?,
        work_id: row.get(2)?,
        phase: parse_enum(&row.get::<String>(3)?)?,
        status: parse_enum(&row.get::<String>(4)?)?,
        final_decision: FinalDecision::from_column(final_decision),
        priority_score: get_int(row, 6)?,
        ai: match (suggestion, confidence) {
            (Some(suggestion), Some(confidence)) => Some(AiAssessment {
                suggestion,
                confidence,
                reasoning: get_opt_string(row, 9)?,
            }),
            _ => None,
        },
        created_at: parse_datetime(&row.get::<String>(10)?)?,
        updated_at: parse_datetime(&row.get::<String>(11)?)?,
    })
}

fn row_to_work(row: &libsql::Row) -> Result<Work, DatabaseError> {
    Ok(Work {
        id: row.get(0)?,
        title: row.get(1)?,
        abstract_text: get_opt_string(row, 2)?,
        journal: get_opt_string(row, 3)?,
        publication_year: get_opt_int(row, 4)?,
        keywords: parse_json(&row.get::<String>(5)?)?,
    })
}

pub(crate) async fn load_study(conn: &libsql::Connection, id: &str) -> Result<Study, EngineError> {
    let rows = conn
        .query(&format!("SELECT {STUDY_COLS} FROM studies WHERE id = ?1"), [id])
        .await?;
    first_row(rows, row_to_study)
        .await?
        .ok_or_else(|| EngineError::not_found("study", id))
}

pub(crate) async fn load_work(conn: &libsql::Connection, id: &str) -> Result<Work, EngineError> {
    let rows = conn
        .query(&format!("SELECT {WORK_COLS} FROM works WHERE id = ?1"), [id])
        .await?;
    first_row(rows, row_to_work)
        .await?
        .ok_or_else(|| EngineError::not_found("work", id))
}

/// Write the consensus-owned columns of a study.
pub(crate) async fn write_study_state(
    conn: &libsql::Connection,
    study_id: &str,
    phase: Phase,
    status: StudyStatus,
    final_decision: FinalDecision,
) -> Result<(), EngineError> {
    conn.execute(
        "UPDATE studies SET phase = ?1, status = ?2, final_decision = ?3, updated_at = ?4 WHERE id = ?5",
        libsql::params![
            phase.as_str(),
            status.as_str(),
            final_decision.as_column(),
            Utc::now().to_rfc3339(),
            study_id
        ],
    )
    .await?;
    Ok(())
}

/// Filter for [`SiftService::list_studies`].
#[derive(Debug, Clone, Default)]
pub struct StudyFilter {
    pub phase: Option<Phase>,
    pub status: Option<StudyStatus>,
    pub limit: Option<u32>,
}

/// Outcome of a priority recomputation batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RescoreReport {
    pub scored: usize,
    pub changed: usize,
}

impl SiftService {
    /// Add a study (and its work snapshot) to a project at TITLE_ABSTRACT/PENDING.
    ///
    /// The initial priority uses recency and AI signals only; run
    /// [`Self::rescore_priorities`] to apply journal and keyword criteria.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank title, `NotFound` for an unknown project.
    pub async fn add_study(&self, project_id: &str, work: &NewWork) -> Result<Study, EngineError> {
        work.validate()?;
        with_retry(self.retry_config(), "add_study", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self.insert_study(&tx, project_id, work).await;
            self.finish(tx, result).await
        })
        .await
    }

    async fn insert_study(
        &self,
        tx: &libsql::Transaction,
        project_id: &str,
        new_work: &NewWork,
    ) -> Result<Study, EngineError> {
        load_project(tx, project_id).await?;

        let work = Work {
            id: self.db().generate_id(PREFIX_WORK).await?,
            title: new_work.title.trim().to_string(),
            abstract_text: new_work.abstract_text.clone(),
            journal: new_work.journal.clone(),
            publication_year: new_work.publication_year,
            keywords: new_work.keywords.clone(),
        };
        tx.execute(
            "INSERT INTO works (id, title, abstract_text, journal, publication_year, keywords)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            libsql::params![
                work.id.as_str(),
                work.title.as_str(),
                work.abstract_text.as_deref(),
                work.journal.as_deref(),
                work.publication_year.map(i64::from),
                to_json(&work.keywords)?
            ],
        )
        .await?;

        let now = Utc::now();
        let score = priority::score(&work, None, &PriorityCriteria::default(), now.year());
        let study = Study {
            id: self.db().generate_id(PREFIX_STUDY).await?,
            project_id: project_id.to_string(),
            work_id: work.id.clone(),
            phase: Phase::TitleAbstract,
            status: StudyStatus::Pending,
            final_decision: FinalDecision::Undecided,
            priority_score: score.score,
            ai: None,
            created_at: now,
            updated_at: now,
        };
        tx.execute(
            "INSERT INTO studies (id, project_id, work_id, phase, status, priority_score, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            libsql::params![
                study.id.as_str(),
                project_id,
                work.id.as_str(),
                study.phase.as_str(),
                study.status.as_str(),
                i64::from(study.priority_score),
                now.to_rfc3339(),
                now.to_rfc3339()
            ],
        )
        .await?;

        self.append_audit(
            tx,
            Audit::new(project_id, EntityType::Study, &study.id, AuditAction::Created)
                .detail(&work)?,
        )
        .await?;
        Ok(study)
    }

    /// # Errors
    ///
    /// `NotFound` if no study has this id.
    pub async fn get_study(&self, id: &str) -> Result<Study, EngineError> {
        let _gate = self.lock_reads().await;
        load_study(self.db().conn(), id).await
    }

    /// # Errors
    ///
    /// `NotFound` if no work has this id.
    pub async fn get_work(&self, id: &str) -> Result<Work, EngineError> {
        let _gate = self.lock_reads().await;
        load_work(self.db().conn(), id).await
    }

    /// Studies of a project in creation order.
    pub async fn list_studies(
        &self,
        project_id: &str,
        filter: &StudyFilter,
    ) -> Result<Vec<Study>, EngineError> {
        let mut conditions = vec!["project_id = ?1".to_string()];
        let mut params: Vec<libsql::Value> = vec![project_id.into()];

        if let Some(phase) = filter.phase {
            params.push(phase.as_str().into());
            conditions.push(format!("phase = ?{}", params.len()));
        }
        if let Some(status) = filter.status {
            params.push(status.as_str().into());
            conditions.push(format!("status = ?{}", params.len()));
        }

        let limit = filter.limit.unwrap_or(u32::MAX);
        let sql = format!(
            "SELECT {STUDY_COLS} FROM studies WHERE {}
             ORDER BY created_at, rowid LIMIT {limit}",
            conditions.join(" AND ")
        );
        let _gate = self.lock_reads().await;
        let rows = self
            .db()
            .conn()
            .query(&sql, libsql::params_from_iter(params))
            .await?;
        Ok(collect_rows(rows, row_to_study).await?)
    }

    /// Attach machine triage to a study. Feeds queue ordering and scoring.
    ///
    /// # Errors
    ///
    /// `Validation` if the confidence is outside `[0, 1]`, `NotFound` for an
    /// unknown study.
    pub async fn record_ai_assessment(
        &self,
        study_id: &str,
        assessment: &AiAssessment,
    ) -> Result<Study, EngineError> {
        assessment.validate()?;
        with_retry(self.retry_config(), "record_ai_assessment", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self.write_ai_assessment(&tx, study_id, assessment).await;
            self.finish(tx, result).await
        })
        .await
    }

    async fn write_ai_assessment(
        &self,
        tx: &libsql::Transaction,
        study_id: &str,
        assessment: &AiAssessment,
    ) -> Result<Study, EngineError> {
        let study = load_study(tx, study_id).await?;
        tx.execute(
            "UPDATE studies SET ai_suggestion = ?1, ai_confidence = ?2, ai_reasoning = ?3, updated_at = ?4
             WHERE id = ?5",
            libsql::params![
                assessment.suggestion.as_str(),
                assessment.confidence,
                assessment.reasoning.as_deref(),
                Utc::now().to_rfc3339(),
                study_id
            ],
        )
        .await?;
        self.append_audit(
            tx,
            Audit::new(&study.project_id, EntityType::Study, study_id, AuditAction::Updated)
                .detail(assessment)?,
        )
        .await?;
        load_study(tx, study_id).await
    }

    /// Recompute priority scores for every open study of a project.
    ///
    /// Each study is scored and written in its own short statement so the
    /// batch never holds the write lock across studies.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown project; storage errors abort the batch.
    pub async fn rescore_priorities(
        &self,
        project_id: &str,
        criteria: &PriorityCriteria,
        current_year: i32,
    ) -> Result<RescoreReport, EngineError> {
        {
            let _gate = self.lock_reads().await;
            load_project(self.db().conn(), project_id).await?;
        }
        let studies = self
            .list_studies(project_id, &StudyFilter::default())
            .await?;

        let mut report = RescoreReport::default();
        for study in studies.iter().filter(|s| !s.status.is_terminal()) {
            let work = self.get_work(&study.work_id).await?;
            let breakdown = priority::score(&work, study.ai_confidence(), criteria, current_year);
            report.scored += 1;
            if breakdown.score == study.priority_score {
                continue;
            }
            let (id, score) = (study.id.as_str(), breakdown.score);
            with_retry(self.retry_config(), "rescore_priorities", || async move {
                let _gate = self.lock_writes().await;
                self.db()
                    .conn()
                    .execute(
                        "UPDATE studies SET priority_score = ?1, updated_at = ?2 WHERE id = ?3",
                        libsql::params![i64::from(score), Utc::now().to_rfc3339(), id],
                    )
                    .await?;
                Ok::<_, EngineError>(())
            })
            .await?;
            report.changed += 1;
            tracing::debug!(study_id = %study.id, score = breakdown.score, "priority rescored");
        }

        let summary = &report;
        with_retry(self.retry_config(), "rescore_audit", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self.audit_rescore(&tx, project_id, summary).await;
            self.finish(tx, result).await
        })
        .await?;

        tracing::info!(project_id, scored = report.scored, changed = report.changed, "priorities rescored");
        Ok(report)
    }

    async fn audit_rescore(
        &self,
        tx: &libsql::Transaction,
        project_id: &str,
        report: &RescoreReport,
    ) -> Result<(), EngineError> {
        self.append_audit(
            tx,
            Audit::new(project_id, EntityType::Project, project_id, AuditAction::Rescored)
                .detail(report)?,
        )
        .await?;
        Ok(())
    }
}
