//! JSONL activity trail settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActivityConfig {
    /// Directory receiving one `<project_id>.jsonl` file per project.
    /// Unset disables the trail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trail_dir: Option<String>,
}

impl ActivityConfig {
    #[must_use]
    pub fn trail_dir(&self) -> Option<PathBuf> {
        self.trail_dir
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
    }
}
