//! Service layer orchestrating engine operations with audit and trail.
//!
//! `SiftService` wraps `SiftDb` (raw database access), `TrailWriter` (JSONL
//! activity trail) and the ingestion/notification collaborators. All engine
//! operations are implemented as `impl SiftService` blocks.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use sift_config::SiftConfig;
use sift_core::entities::AuditEntry;
use sift_core::enums::{AuditAction, EntityType};
use sift_core::ids::PREFIX_AUDIT;

use crate::SiftDb;
use crate::error::{DatabaseError, EngineError};
use crate::ingestion::{IngestionQueue, TracingIngestionQueue};
use crate::notify::{Notifier, TracingNotifier};
use crate::retry::RetryConfig;
use crate::trail::writer::TrailWriter;

/// Default `source` tag on ingestion requests.
pub const DEFAULT_INGESTION_SOURCE: &str = "screening";

/// Orchestrates engine operations over one database connection.
///
/// Every mutation follows this protocol:
/// 1. Take the service write gate (one transaction per connection at a time)
/// 2. `BEGIN IMMEDIATE`
/// 3. Execute SQL and append audit entries (inside the transaction)
/// 4. Commit, then mirror the audit entries to the JSONL trail
///
/// Busy failures re-run the whole protocol per [`RetryConfig`].
///
/// The service owns a single connection. Public reads take the same gate as
/// writes, so one service can be shared across tasks (e.g. behind an `Arc`)
/// without a read observing another task's uncommitted transaction.
pub struct SiftService {
    db: SiftDb,
    trail: TrailWriter,
    ingestion: Arc<dyn IngestionQueue>,
    notifier: Arc<dyn Notifier>,
    retry: RetryConfig,
    ingestion_source: String,
    write_gate: tokio::sync::Mutex<()>,
    pending_trail: Mutex<Vec<AuditEntry>>,
}

impl SiftService {
    /// Create a new service wrapping a local database.
    ///
    /// * `db_path`: path to the libSQL database file, or `":memory:"` for tests.
    /// * `trail_dir`: directory for JSONL trail files; `None` disables the trail.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or the trail
    /// directory cannot be created.
    pub async fn new_local(
        db_path: &str,
        trail_dir: Option<PathBuf>,
    ) -> Result<Self, DatabaseError> {
        let db = SiftDb::open_local(db_path).await?;
        let trail = match trail_dir {
            Some(dir) => TrailWriter::new(dir)?,
            None => TrailWriter::disabled(),
        };
        Ok(Self::from_db(db, trail))
    }

    /// Create a service from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or the trail
    /// directory cannot be created.
    pub async fn from_config(config: &SiftConfig) -> Result<Self, DatabaseError> {
        if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
            if !config.database.is_in_memory() && !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Other(e.into()))?;
            }
        }
        let db = SiftDb::open_with_timeout(&config.database.path, config.database.busy_timeout_ms)
            .await?;
        let trail = match config.activity.trail_dir() {
            Some(dir) => TrailWriter::new(dir)?,
            None => TrailWriter::disabled(),
        };
        Ok(Self::from_db(db, trail)
            .with_retry(RetryConfig::from(&config.retry))
            .with_ingestion_source(config.screening.ingestion_source.clone()))
    }

    /// Create from an existing `SiftDb` with default collaborators.
    #[must_use]
    pub fn from_db(db: SiftDb, trail: TrailWriter) -> Self {
        Self {
            db,
            trail,
            ingestion: Arc::new(TracingIngestionQueue),
            notifier: Arc::new(TracingNotifier),
            retry: RetryConfig::default(),
            ingestion_source: DEFAULT_INGESTION_SOURCE.to_string(),
            write_gate: tokio::sync::Mutex::new(()),
            pending_trail: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_ingestion_queue(mut self, queue: Arc<dyn IngestionQueue>) -> Self {
        self.ingestion = queue;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_ingestion_source(mut self, source: String) -> Self {
        self.ingestion_source = source;
        self
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &SiftDb {
        &self.db
    }

    #[must_use]
    pub const fn trail(&self) -> &TrailWriter {
        &self.trail
    }

    #[must_use]
    pub const fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub(crate) fn ingestion_queue(&self) -> &dyn IngestionQueue {
        self.ingestion.as_ref()
    }

    pub(crate) fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub(crate) fn ingestion_source(&self) -> &str {
        &self.ingestion_source
    }

    /// Serialize writers on this connection.
    ///
    /// Statements issued on the connection while another task holds an open
    /// transaction would join that transaction.
    pub(crate) async fn lock_writes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_gate.lock().await
    }

    /// Hold the gate for a read so it never runs inside another task's open
    /// transaction on the shared connection.
    pub(crate) async fn lock_reads(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_gate.lock().await
    }

    /// Take the write gate and open an immediate transaction.
    pub(crate) async fn begin_write(
        &self,
    ) -> Result<(tokio::sync::MutexGuard<'_, ()>, libsql::Transaction), EngineError> {
        let gate = self.lock_writes().await;
        let tx = self.db.begin_immediate().await?;
        Ok((gate, tx))
    }

    /// Commit on success, roll back on failure.
    ///
    /// Audit entries buffered during the transaction reach the JSONL trail
    /// only after a successful commit; a failed commit discards them.
    pub(crate) async fn finish<T>(
        &self,
        tx: libsql::Transaction,
        result: Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        match result {
            Ok(value) => {
                let entries = std::mem::take(&mut *self.pending_trail_lock());
                if let Err(e) = tx.commit().await {
                    tracing::warn!(error = %e, discarded = entries.len(), "commit failed");
                    // A refused COMMIT leaves the transaction open on the connection.
                    if self.db.conn().execute("ROLLBACK", ()).await.is_ok() {
                        tracing::debug!("rolled back transaction left open by failed commit");
                    }
                    return Err(e.into());
                }
                if let Err(e) = self.trail.append_all(&entries) {
                    tracing::warn!(error = %e, "failed to mirror audit entries to trail");
                }
                Ok(value)
            }
            Err(e) => {
                self.pending_trail_lock().clear();
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    fn pending_trail_lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditEntry>> {
        self.pending_trail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an audit entry inside `tx`. Called by every mutation.
    pub(crate) async fn append_audit(
        &self,
        tx: &libsql::Transaction,
        audit: Audit<'_>,
    ) -> Result<AuditEntry, EngineError> {
        let entry = AuditEntry {
            id: self.db.generate_id(PREFIX_AUDIT).await?,
            project_id: audit.project_id.map(String::from),
            entity_type: audit.entity_type,
            entity_id: audit.entity_id.to_string(),
            action: audit.action,
            actor_id: audit.actor_id.map(String::from),
            detail: audit.detail,
            created_at: chrono::Utc::now(),
        };
        tx.execute(
            "INSERT INTO audit_trail (id, project_id, entity_type, entity_id, action, actor_id, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            libsql::params![
                entry.id.as_str(),
                entry.project_id.as_deref(),
                entry.entity_type.as_str(),
                entry.entity_id.as_str(),
                entry.action.as_str(),
                entry.actor_id.as_deref(),
                entry.detail.as_ref().map(std::string::ToString::to_string),
                entry.created_at.to_rfc3339()
            ],
        )
        .await?;
        self.pending_trail_lock().push(entry.clone());
        Ok(entry)
    }
}

/// Borrowed fields of an audit entry about to be written.
pub(crate) struct Audit<'a> {
    pub project_id: Option<&'a str>,
    pub entity_type: EntityType,
    pub entity_id: &'a str,
    pub action: AuditAction,
    pub actor_id: Option<&'a str>,
    pub detail: Option<serde_json::Value>,
}

impl<'a> Audit<'a> {
    pub(crate) const fn new(
        project_id: &'a str,
        entity_type: EntityType,
        entity_id: &'a str,
        action: AuditAction,
    ) -> Self {
        Self {
            project_id: Some(project_id),
            entity_type,
            entity_id,
            action,
            actor_id: None,
            detail: None,
        }
    }

    pub(crate) fn by(mut self, actor_id: Option<&'a str>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub(crate) fn detail<T: serde::Serialize>(mut self, detail: &T) -> Result<Self, EngineError> {
        self.detail = Some(serde_json::to_value(detail)?);
        Ok(self)
    }
}
