use clap::Subcommand;

/// Study commands.
#[derive(Clone, Debug, Subcommand)]
pub enum StudyCommands {
    /// Add a study to a project.
    Add {
        project_id: String,
        #[arg(long)]
        title: String,
        #[arg(long = "abstract")]
        abstract_text: Option<String>,
        #[arg(long)]
        journal: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        keyword: Vec<String>,
    },
    /// Get a study, its work and its decisions.
    Get { id: String },
    /// List studies of a project.
    List {
        project_id: String,
        #[arg(long)]
        phase: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Record an AI screening suggestion.
    Assess {
        id: String,
        #[arg(long)]
        suggestion: String,
        /// In [0, 1].
        #[arg(long)]
        confidence: f64,
        #[arg(long)]
        reasoning: Option<String>,
    },
    /// List decisions recorded for a study.
    Decisions {
        id: String,
        #[arg(long)]
        phase: Option<String>,
    },
}
