//! Materialized per-(project, phase) screening counters.
//!
//! Counters move in the same transaction as the write they describe, so a
//! rolled-back submission never shows up in the statistics.

use sift_core::entities::PhaseStats;
use sift_core::enums::{Phase, Verdict};

use crate::error::{DatabaseError, EngineError};
use crate::helpers::first_row;
use crate::repos::project::load_project;
use crate::service::SiftService;

/// One counter increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    Decision(Verdict),
    ConflictOpened,
    ConflictResolved,
    Finalized,
    Advanced,
}

impl Counter {
    const fn assignments(self) -> &'static str {
        match self {
            Self::Decision(Verdict::Include) => "decisions = decisions + 1, includes = includes + 1",
            Self::Decision(Verdict::Exclude) => "decisions = decisions + 1, excludes = excludes + 1",
            Self::Decision(Verdict::Maybe) => "decisions = decisions + 1, maybes = maybes + 1",
            Self::ConflictOpened => "conflicts_opened = conflicts_opened + 1",
            Self::ConflictResolved => "conflicts_resolved = conflicts_resolved + 1",
            Self::Finalized => "finalized = finalized + 1",
            Self::Advanced => "advanced = advanced + 1",
        }
    }
}

pub(crate) async fn bump(
    conn: &libsql::Connection,
    project_id: &str,
    phase: Phase,
    counter: Counter,
) -> Result<(), EngineError> {
    conn.execute(
        "INSERT INTO phase_counters (project_id, phase) VALUES (?1, ?2)
         ON CONFLICT(project_id, phase) DO NOTHING",
        [project_id, phase.as_str()],
    )
    .await?;
    conn.execute(
        &format!(
            "UPDATE phase_counters SET {} WHERE project_id = ?1 AND phase = ?2",
            counter.assignments()
        ),
        [project_id, phase.as_str()],
    )
    .await?;
    Ok(())
}

impl SiftService {
    /// Screening counters for one phase of a project.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown project.
    pub async fn phase_stats(&self, project_id: &str, phase: Phase) -> Result<PhaseStats, EngineError> {
        let _gate = self.lock_reads().await;
        load_project(self.db().conn(), project_id).await?;
        let rows = self
            .db()
            .conn()
            .query(
                "SELECT decisions, includes, excludes, maybes, conflicts_opened, conflicts_resolved, finalized, advanced
                 FROM phase_counters WHERE project_id = ?1 AND phase = ?2",
                [project_id, phase.as_str()],
            )
            .await?;
        let stats = first_row(rows, |row| {
            Ok::<_, DatabaseError>(PhaseStats {
                project_id: project_id.to_string(),
                phase,
                decisions: row.get(0)?,
                includes: row.get(1)?,
                excludes: row.get(2)?,
                maybes: row.get(3)?,
                conflicts_opened: row.get(4)?,
                conflicts_resolved: row.get(5)?,
                finalized: row.get(6)?,
                advanced: row.get(7)?,
            })
        })
        .await?;
        Ok(stats.unwrap_or_else(|| PhaseStats::empty(project_id, phase)))
    }
}
