//! # sift-db
//!
//! libSQL storage and the screening engine for Sift.
//!
//! Holds all relational state: projects, members, studies, decisions,
//! conflicts, resolutions, calibration rounds, the ingestion outbox,
//! per-phase counters and the audit trail. Every engine operation is an
//! `impl SiftService` block under [`repos`] or [`sweeper`].
//!
//! Write paths run inside `BEGIN IMMEDIATE` transactions so the decision
//! insert, the consensus re-read and the resulting study write are one
//! serialized unit across connections.

pub mod error;
pub mod helpers;
pub mod ingestion;
mod migrations;
pub mod notify;
pub mod repos;
pub mod retry;
pub mod service;
pub mod sweeper;
pub mod trail;

#[cfg(test)]
mod test_support;

use error::DatabaseError;
use libsql::{Builder, TransactionBehavior};

/// Default busy timeout applied when none is configured.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Central database handle for all Sift state.
///
/// Wraps a libSQL database and a single connection. Open one handle per
/// concurrent writer; `SQLite` serializes writers across connections.
pub struct SiftDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl SiftDb {
    /// Open a local database at the given path (`":memory:"` for tests).
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Open a local database with an explicit busy timeout.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened, a pragma
    /// is rejected, or migrations fail.
    pub async fn open_with_timeout(path: &str, busy_timeout_ms: u64) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Enable foreign keys (must be per-connection in SQLite)
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        // These pragmas return a row, so they go through `query`.
        pragma(&conn, &format!("PRAGMA busy_timeout = {busy_timeout_ms}")).await?;
        if path != ":memory:" {
            pragma(&conn, "PRAGMA journal_mode = WAL").await?;
        }

        let sift_db = Self { db, conn };
        sift_db.run_migrations().await?;
        tracing::debug!(path, busy_timeout_ms, "database opened");
        Ok(sift_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Start a write transaction that takes the database write lock up front.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the lock cannot be acquired within the
    /// busy timeout.
    pub async fn begin_immediate(&self) -> Result<libsql::Transaction, DatabaseError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?)
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"dec-a3f8b2c1"`.
    ///
    /// Uses `randomblob(4)` in SQL to produce 8-char hex, then prepends the prefix.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT '{prefix}-' || lower(hex(randomblob(4)))"),
                (),
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(row.get::<String>(0)?)
    }
}

async fn pragma(conn: &libsql::Connection, sql: &str) -> Result<(), DatabaseError> {
    let mut rows = conn
        .query(sql, ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("{sql}: {e}")))?;
    while rows.next().await?.is_some() {}
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::ids::ALL_PREFIXES;
    use std::collections::HashSet;

    async fn test_db() -> SiftDb {
        SiftDb::open_local(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn open_local_creates_schema() {
        let db = test_db().await;

        let tables = [
            "projects",
            "project_members",
            "works",
            "studies",
            "decisions",
            "conflicts",
            "conflict_resolutions",
            "ingestion_signals",
            "calibration_rounds",
            "calibration_samples",
            "calibration_participants",
            "calibration_decisions",
            "phase_counters",
            "audit_trail",
        ];
        for table in &tables {
            let mut rows = db
                .conn()
                .query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap();
            assert!(row.is_some(), "table '{table}' should exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = test_db().await;
        db.run_migrations().await.unwrap();
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn generate_id_has_prefix_and_is_unique() {
        let db = test_db().await;
        for prefix in ALL_PREFIXES {
            let id = db.generate_id(prefix).await.unwrap();
            assert!(id.starts_with(&format!("{prefix}-")), "bad id {id}");
            assert_eq!(id.len(), prefix.len() + 9);
        }

        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(db.generate_id("dec").await.unwrap()));
        }
    }

    #[tokio::test]
    async fn file_database_opens_in_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sift.db");
        let db = SiftDb::open_local(path.to_str().unwrap()).await.unwrap();

        let mut rows = db.conn().query("PRAGMA journal_mode", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap().to_lowercase(), "wal");
    }
}
