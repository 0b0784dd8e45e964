use clap::{Args, Subcommand};

use crate::cli::subcommands::{
    CalibrationCommands, ConflictCommands, IngestCommands, MemberCommands, ProjectCommands,
    StudyCommands,
};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Screening projects.
    Project {
        #[command(subcommand)]
        action: ProjectCommands,
    },
    /// Project membership.
    Member {
        #[command(subcommand)]
        action: MemberCommands,
    },
    /// Studies under screening.
    Study {
        #[command(subcommand)]
        action: StudyCommands,
    },
    /// Record a screening decision and evaluate consensus.
    Decide(DecideArgs),
    /// Reviewer conflicts.
    Conflict {
        #[command(subcommand)]
        action: ConflictCommands,
    },
    /// Next studies for a reviewer.
    Queue(QueueArgs),
    /// Pairwise Cohen's kappa between reviewers.
    Reliability(ReliabilityArgs),
    /// Calibration rounds.
    Calibration {
        #[command(subcommand)]
        action: CalibrationCommands,
    },
    /// Reconcile studies whose decisions were not applied.
    Sweep(SweepArgs),
    /// Recompute study priorities from configured criteria.
    Rescore(RescoreArgs),
    /// Per-phase screening counters.
    Stats(StatsArgs),
    /// View audit trail.
    Audit(AuditArgs),
    /// Ingestion signals.
    Ingest {
        #[command(subcommand)]
        action: IngestCommands,
    },
    /// Dump JSON schema for an entity type.
    Schema(SchemaArgs),
}

/// Arguments for `sift decide`.
#[derive(Clone, Debug, Args)]
pub struct DecideArgs {
    pub study_id: String,
    #[arg(long)]
    pub reviewer: String,
    #[arg(long)]
    pub verdict: String,
    #[arg(long, default_value = "title_abstract")]
    pub phase: String,
    #[arg(long)]
    pub reasoning: Option<String>,
    /// Required for exclude verdicts.
    #[arg(long)]
    pub exclusion_reason: Option<String>,
    /// Self-reported confidence, 1 to 5.
    #[arg(long)]
    pub confidence: Option<u32>,
    #[arg(long)]
    pub time_spent_ms: Option<u64>,
}

/// Arguments for `sift queue`.
#[derive(Clone, Debug, Args)]
pub struct QueueArgs {
    pub project_id: String,
    #[arg(long)]
    pub reviewer: String,
    #[arg(long, default_value = "title_abstract")]
    pub phase: String,
    /// fifo, priority, ai_confident, ai_uncertain, balanced, random
    #[arg(long, default_value = "fifo")]
    pub strategy: String,
    /// Seed for the random strategy.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for `sift reliability`.
#[derive(Clone, Debug, Args)]
pub struct ReliabilityArgs {
    pub project_id: String,
    #[arg(long, default_value = "title_abstract")]
    pub phase: String,
    /// Count MAYBE as EXCLUDE.
    #[arg(long)]
    pub collapse_maybe: bool,
}

/// Arguments for `sift sweep`.
#[derive(Clone, Debug, Args)]
pub struct SweepArgs {
    /// Restrict the sweep to one project.
    #[arg(long)]
    pub project: Option<String>,
}

/// Arguments for `sift rescore`.
#[derive(Clone, Debug, Args)]
pub struct RescoreArgs {
    pub project_id: String,
    /// Score as of this year (defaults to the current year).
    #[arg(long)]
    pub year: Option<i32>,
}

/// Arguments for `sift stats`.
#[derive(Clone, Debug, Args)]
pub struct StatsArgs {
    pub project_id: String,
    #[arg(long, default_value = "title_abstract")]
    pub phase: String,
}

/// Arguments for `sift audit`.
#[derive(Clone, Debug, Args)]
pub struct AuditArgs {
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub entity_type: Option<String>,
    #[arg(long)]
    pub entity_id: Option<String>,
    #[arg(long)]
    pub action: Option<String>,
}

/// Arguments for `sift schema`.
#[derive(Clone, Debug, Args)]
pub struct SchemaArgs {
    pub type_name: String,
}
