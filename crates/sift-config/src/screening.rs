//! Screening defaults applied when projects are created and queues are served.

use serde::{Deserialize, Serialize};
use sift_core::enums::Phase;

const fn default_required_reviewers() -> u32 {
    2
}

const fn default_last_phase() -> Phase {
    Phase::FullText
}

const fn default_queue_limit() -> u32 {
    50
}

fn default_ingestion_source() -> String {
    "screening".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScreeningConfig {
    /// Reviewers required per study/phase for new projects.
    #[serde(default = "default_required_reviewers")]
    pub default_required_reviewers: u32,

    /// Last screening phase for new projects.
    #[serde(default = "default_last_phase")]
    pub default_last_phase: Phase,

    /// Default number of studies returned by a queue request.
    #[serde(default = "default_queue_limit")]
    pub queue_limit: u32,

    /// Source tag attached to ingestion requests.
    #[serde(default = "default_ingestion_source")]
    pub ingestion_source: String,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            default_required_reviewers: default_required_reviewers(),
            default_last_phase: default_last_phase(),
            queue_limit: default_queue_limit(),
            ingestion_source: default_ingestion_source(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = ScreeningConfig::default();
        assert_eq!(config.default_required_reviewers, 2);
        assert_eq!(config.default_last_phase, Phase::FullText);
        assert_eq!(config.queue_limit, 50);
        assert_eq!(config.ingestion_source, "screening");
    }
}
