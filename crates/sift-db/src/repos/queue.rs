//! Screening queue scheduler.
//!
//! Eligibility is decided in SQL; ordering is the pure strategy code in
//! `sift_core::queue`.

use sift_core::entities::Study;
use sift_core::enums::{Phase, QueueStrategy};
use sift_core::queue;

use crate::error::EngineError;
use crate::helpers::collect_rows;
use crate::repos::project::{load_project, require_screener};
use crate::repos::study::{STUDY_COLS, row_to_study};
use crate::service::SiftService;

pub const DEFAULT_QUEUE_LIMIT: u32 = 50;

/// Parameters of one queue request.
#[derive(Debug, Clone)]
pub struct QueueRequest {
    pub project_id: String,
    pub reviewer_id: String,
    pub phase: Phase,
    pub strategy: QueueStrategy,
    pub limit: Option<u32>,
    /// Seed for [`QueueStrategy::Random`].
    pub seed: Option<u64>,
}

impl QueueRequest {
    #[must_use]
    pub fn new(project_id: impl Into<String>, reviewer_id: impl Into<String>, phase: Phase) -> Self {
        Self {
            project_id: project_id.into(),
            reviewer_id: reviewer_id.into(),
            phase,
            strategy: QueueStrategy::Fifo,
            limit: None,
            seed: None,
        }
    }

    #[must_use]
    pub const fn strategy(mut self, strategy: QueueStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl SiftService {
    /// Studies `reviewer_id` can still decide in `phase`, ordered by the
    /// requested strategy.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown project, `Forbidden` unless the reviewer is
    /// an active screening member.
    pub async fn get_queue(&self, request: &QueueRequest) -> Result<Vec<Study>, EngineError> {
        let _gate = self.lock_reads().await;
        let conn = self.db().conn();
        load_project(conn, &request.project_id).await?;
        require_screener(conn, &request.project_id, &request.reviewer_id).await?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {STUDY_COLS} FROM studies s
                     WHERE s.project_id = ?1 AND s.phase = ?2 AND s.status IN ('pending', 'screening')
                       AND NOT EXISTS (
                           SELECT 1 FROM decisions d
                           WHERE d.study_id = s.id AND d.reviewer_id = ?3 AND d.phase = ?2
                       )
                     ORDER BY s.created_at, s.rowid"
                ),
                [
                    request.project_id.as_str(),
                    request.phase.as_str(),
                    request.reviewer_id.as_str(),
                ],
            )
            .await?;
        let eligible = collect_rows(rows, row_to_study).await?;

        let limit = request.limit.unwrap_or(DEFAULT_QUEUE_LIMIT) as usize;
        let mut ordered = queue::order(eligible, request.strategy, request.seed);
        ordered.truncate(limit);
        tracing::debug!(
            project_id = %request.project_id,
            reviewer_id = %request.reviewer_id,
            strategy = %request.strategy,
            size = ordered.len(),
            "queue built"
        );
        Ok(ordered)
    }
}
