//! Reliability analyzer over recorded screening decisions.

use sift_core::enums::{Phase, Verdict};
use sift_core::reliability::{KappaOptions, Ratings, ReliabilityReport, pairwise_report};

use crate::error::{DatabaseError, EngineError};
use crate::helpers::{collect_rows, parse_enum};
use crate::repos::project::load_project;
use crate::service::SiftService;

/// Fold `(reviewer, study, verdict)` rows into per-reviewer ratings.
pub(crate) fn ratings_from(rows: Vec<(String, String, Verdict)>) -> Ratings {
    let mut ratings = Ratings::new();
    for (reviewer, study, verdict) in rows {
        ratings.entry(reviewer).or_default().insert(study, verdict);
    }
    ratings
}

pub(crate) fn row_to_rating(row: &libsql::Row) -> Result<(String, String, Verdict), DatabaseError> {
    Ok((row.get(0)?, row.get(1)?, parse_enum(&row.get::<String>(2)?)?))
}

impl SiftService {
    /// Pairwise Cohen's Kappa between every pair of reviewers who co-screened
    /// studies of `project_id` in `phase`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown project.
    pub async fn get_reliability(
        &self,
        project_id: &str,
        phase: Phase,
        options: KappaOptions,
    ) -> Result<ReliabilityReport, EngineError> {
        let _gate = self.lock_reads().await;
        let conn = self.db().conn();
        load_project(conn, project_id).await?;
        let rows = conn
            .query(
                "SELECT reviewer_id, study_id, verdict FROM decisions
                 WHERE project_id = ?1 AND phase = ?2 ORDER BY reviewer_id, study_id",
                [project_id, phase.as_str()],
            )
            .await?;
        let ratings = ratings_from(collect_rows(rows, row_to_rating).await?);
        let report = pairwise_report(&ratings, options);
        tracing::debug!(
            project_id,
            %phase,
            pairs = report.pairs.len(),
            average_kappa = ?report.average_kappa,
            "reliability computed"
        );
        Ok(report)
    }
}
