use clap::Subcommand;

/// Project commands.
#[derive(Clone, Debug, Subcommand)]
pub enum ProjectCommands {
    /// Create a project.
    Create {
        #[arg(long)]
        name: String,
        /// Reviewers required per study and phase (defaults from config).
        #[arg(long)]
        required_reviewers: Option<u32>,
        /// title_abstract or full_text (defaults from config).
        #[arg(long)]
        last_phase: Option<String>,
    },
    /// Get a project by ID.
    Get { id: String },
    /// List projects.
    List,
}
