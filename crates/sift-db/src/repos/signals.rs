//! Durable ingestion signals.
//!
//! A final include is recorded as a row keyed by `(study_id, phase)` inside
//! the transaction that settles the study. Delivery to the downstream
//! [`IngestionQueue`](crate::ingestion::IngestionQueue) happens after commit
//! and claims each row with a conditional update, so the live path and the
//! sweeper can both race to dispatch without enqueuing a study twice.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sift_core::enums::{AuditAction, EntityType, Phase};

use crate::error::{DatabaseError, EngineError};
use crate::helpers::{collect_rows, parse_datetime, parse_enum, parse_optional_datetime};
use crate::ingestion::IngestionRequest;
use crate::retry::with_retry;
use crate::service::{Audit, SiftService};

/// A recorded ingestion signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionSignal {
    pub project_id: String,
    pub study_id: String,
    pub phase: Phase,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl IngestionSignal {
    fn request(&self) -> IngestionRequest {
        IngestionRequest {
            project_id: self.project_id.clone(),
            study_id: self.study_id.clone(),
            phase: self.phase,
            source: self.source.clone(),
        }
    }
}

const SIGNAL_COLS: &str = "project_id, study_id, phase, source, created_at, dispatched_at";

fn row_to_signal(row: &libsql::Row) -> Result<IngestionSignal, DatabaseError> {
    Ok(IngestionSignal {
        project_id: row.get(0)?,
        study_id: row.get(1)?,
        phase: parse_enum(&row.get::<String>(2)?)?,
        source: row.get(3)?,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
        dispatched_at: parse_optional_datetime(row.get::<Option<String>>(5)?.as_deref())?,
    })
}

impl SiftService {
    /// Record the ingestion signal for `(study_id, phase)` inside `tx`.
    ///
    /// Returns `false` when the signal already exists.
    pub(crate) async fn signal_ingestion(
        &self,
        tx: &libsql::Transaction,
        project_id: &str,
        study_id: &str,
        phase: Phase,
        actor_id: Option<&str>,
    ) -> Result<bool, EngineError> {
        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO ingestion_signals (study_id, phase, project_id, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                libsql::params![
                    study_id,
                    phase.as_str(),
                    project_id,
                    self.ingestion_source(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;
        if inserted == 0 {
            tracing::debug!(study_id, %phase, "ingestion already signaled");
            return Ok(false);
        }
        self.append_audit(
            tx,
            Audit::new(project_id, EntityType::Study, study_id, AuditAction::IngestionSignaled)
                .by(actor_id)
                .detail(&serde_json::json!({ "phase": phase, "source": self.ingestion_source() }))?,
        )
        .await?;
        Ok(true)
    }

    /// Hand every undelivered signal to the ingestion queue.
    ///
    /// Returns the number delivered by this call. A signal whose enqueue
    /// fails is released again and picked up by the next dispatch.
    ///
    /// # Errors
    ///
    /// Storage errors while listing or claiming signals.
    pub async fn dispatch_pending_ingestion(&self) -> Result<usize, EngineError> {
        let pending = {
            let _gate = self.lock_reads().await;
            let rows = self
                .db()
                .conn()
                .query(
                    &format!(
                        "SELECT {SIGNAL_COLS} FROM ingestion_signals
                         WHERE dispatched_at IS NULL ORDER BY created_at, rowid"
                    ),
                    (),
                )
                .await?;
            collect_rows(rows, row_to_signal).await?
        };

        let mut delivered = 0;
        for signal in &pending {
            if !self.claim_signal(signal).await? {
                continue;
            }
            match self.ingestion_queue().enqueue_ingestion(&signal.request()) {
                Ok(()) => {
                    delivered += 1;
                    tracing::info!(study_id = %signal.study_id, phase = %signal.phase, "ingestion dispatched");
                }
                Err(e) => {
                    tracing::warn!(study_id = %signal.study_id, error = %e, "ingestion enqueue failed; will retry");
                    self.release_signal(signal).await?;
                }
            }
        }
        Ok(delivered)
    }

    /// Dispatch after a committed write. The write already succeeded, so a
    /// dispatch failure is only logged.
    pub(crate) async fn dispatch_after_commit(&self) {
        if let Err(e) = self.dispatch_pending_ingestion().await {
            tracing::warn!(error = %e, "ingestion dispatch failed");
        }
    }

    async fn claim_signal(&self, signal: &IngestionSignal) -> Result<bool, EngineError> {
        let (study_id, phase) = (signal.study_id.as_str(), signal.phase);
        let claimed = with_retry(self.retry_config(), "claim_ingestion", || async move {
            let _gate = self.lock_writes().await;
            let changed = self
                .db()
                .conn()
                .execute(
                    "UPDATE ingestion_signals SET dispatched_at = ?1
                     WHERE study_id = ?2 AND phase = ?3 AND dispatched_at IS NULL",
                    libsql::params![Utc::now().to_rfc3339(), study_id, phase.as_str()],
                )
                .await?;
            Ok::<_, EngineError>(changed)
        })
        .await?;
        Ok(claimed == 1)
    }

    async fn release_signal(&self, signal: &IngestionSignal) -> Result<(), EngineError> {
        let (study_id, phase) = (signal.study_id.as_str(), signal.phase);
        with_retry(self.retry_config(), "release_ingestion", || async move {
            let _gate = self.lock_writes().await;
            self.db()
                .conn()
                .execute(
                    "UPDATE ingestion_signals SET dispatched_at = NULL WHERE study_id = ?1 AND phase = ?2",
                    libsql::params![study_id, phase.as_str()],
                )
                .await?;
            Ok::<_, EngineError>(())
        })
        .await
    }

    /// Ingestion signals of a project, oldest first.
    pub async fn list_ingestion_signals(
        &self,
        project_id: &str,
    ) -> Result<Vec<IngestionSignal>, EngineError> {
        let _gate = self.lock_reads().await;
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SIGNAL_COLS} FROM ingestion_signals
                     WHERE project_id = ?1 ORDER BY created_at, rowid"
                ),
                [project_id],
            )
            .await?;
        Ok(collect_rows(rows, row_to_signal).await?)
    }
}
