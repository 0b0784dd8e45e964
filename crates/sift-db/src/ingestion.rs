//! Hand-off to the downstream ingestion queue.
//!
//! Studies finally included at their project's last phase are queued for
//! full-text ingestion. The engine writes a signal row keyed by
//! `(study_id, phase)` in the finalizing transaction and delivers it through
//! an [`IngestionQueue`] after commit.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sift_core::enums::Phase;

/// One ready-for-ingestion signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionRequest {
    pub project_id: String,
    pub study_id: String,
    pub phase: Phase,
    pub source: String,
}

/// Downstream queue receiving included studies.
pub trait IngestionQueue: Send + Sync {
    /// Enqueue one study. An error leaves the signal undelivered for a later
    /// dispatch.
    fn enqueue_ingestion(&self, request: &IngestionRequest) -> anyhow::Result<()>;
}

/// Default queue: logs each request.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingIngestionQueue;

impl IngestionQueue for TracingIngestionQueue {
    fn enqueue_ingestion(&self, request: &IngestionRequest) -> anyhow::Result<()> {
        tracing::info!(
            project_id = %request.project_id,
            study_id = %request.study_id,
            phase = %request.phase,
            source = %request.source,
            "study ready for ingestion"
        );
        Ok(())
    }
}

/// In-memory queue that records every request it receives.
#[derive(Debug, Default)]
pub struct MemoryIngestionQueue {
    requests: Mutex<Vec<IngestionRequest>>,
}

impl MemoryIngestionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn requests(&self) -> Vec<IngestionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl IngestionQueue for MemoryIngestionQueue {
    fn enqueue_ingestion(&self, request: &IngestionRequest) -> anyhow::Result<()> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        Ok(())
    }
}
