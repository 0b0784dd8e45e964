use clap::Subcommand;

/// Conflict commands.
#[derive(Clone, Debug, Subcommand)]
pub enum ConflictCommands {
    /// Open a conflict for a study with disagreeing decisions.
    Open {
        study_id: String,
        #[arg(long, default_value = "title_abstract")]
        phase: String,
        #[arg(long)]
        actor: String,
    },
    /// List open conflicts of a project.
    List { project_id: String },
    /// Get a conflict and its resolution, if any.
    Get { id: String },
    /// Move a conflict into discussion.
    Discuss {
        id: String,
        #[arg(long)]
        user: String,
    },
    /// Flag a conflict for attention and notify resolvers.
    Escalate {
        id: String,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: String,
    },
    /// Record the final decision for a conflict.
    Resolve {
        id: String,
        #[arg(long)]
        resolver: String,
        #[arg(long)]
        verdict: String,
        #[arg(long)]
        reasoning: String,
    },
}
