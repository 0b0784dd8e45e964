//! JSONL trail writer.
//!
//! Appends committed `AuditEntry` records to `{trail_dir}/{project_id}.jsonl`.
//! Uses `serde_jsonlines::append_json_lines` for per-line appends.

use std::path::{Path, PathBuf};

use sift_core::entities::AuditEntry;

use crate::error::DatabaseError;

/// File stem for entries that belong to no project.
const GLOBAL_STEM: &str = "global";

/// Appends audit entries to per-project JSONL files.
pub struct TrailWriter {
    trail_dir: PathBuf,
    enabled: bool,
}

impl TrailWriter {
    /// Create a new `TrailWriter` pointing at the given directory.
    ///
    /// Creates the directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created.
    pub fn new(trail_dir: PathBuf) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(&trail_dir).map_err(|e| DatabaseError::Other(e.into()))?;
        Ok(Self {
            trail_dir,
            enabled: true,
        })
    }

    /// Create a disabled writer.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            trail_dir: PathBuf::new(),
            enabled: false,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Path of the trail file for `project_id`.
    #[must_use]
    pub fn path_for(&self, project_id: Option<&str>) -> PathBuf {
        self.trail_dir
            .join(format!("{}.jsonl", project_id.unwrap_or(GLOBAL_STEM)))
    }

    /// Append entries, grouped into their project files.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a file write fails.
    pub fn append_all(&self, entries: &[AuditEntry]) -> Result<(), DatabaseError> {
        if !self.enabled {
            return Ok(());
        }
        for entry in entries {
            let path = self.path_for(entry.project_id.as_deref());
            serde_jsonlines::append_json_lines(&path, [entry])
                .map_err(|e| DatabaseError::Other(e.into()))?;
        }
        Ok(())
    }

    /// Read back every entry of one project's trail file.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the file exists but cannot be parsed.
    pub fn read_project(&self, project_id: &str) -> Result<Vec<AuditEntry>, DatabaseError> {
        let path = self.path_for(Some(project_id));
        if !path.exists() {
            return Ok(Vec::new());
        }
        serde_jsonlines::json_lines(&path)
            .map_err(|e| DatabaseError::Other(e.into()))?
            .collect::<Result<Vec<AuditEntry>, _>>()
            .map_err(|e| DatabaseError::Other(e.into()))
    }

    /// The directory where trail files are stored.
    #[must_use]
    pub fn trail_dir(&self) -> &Path {
        &self.trail_dir
    }
}
