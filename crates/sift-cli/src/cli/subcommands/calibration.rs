use clap::Subcommand;

/// Calibration round commands.
#[derive(Clone, Debug, Subcommand)]
pub enum CalibrationCommands {
    /// Start a calibration round over a random sample of studies.
    Create {
        project_id: String,
        #[arg(long, default_value = "title_abstract")]
        phase: String,
        #[arg(long, default_value_t = 10)]
        sample_size: u32,
        /// Target average kappa in [0, 1].
        #[arg(long, default_value_t = 0.6)]
        target: f64,
    },
    /// Record a calibration decision.
    Decide {
        round_id: String,
        #[arg(long)]
        reviewer: String,
        #[arg(long)]
        study: String,
        #[arg(long)]
        verdict: String,
        #[arg(long)]
        reasoning: Option<String>,
    },
    /// Get a calibration round.
    Get { id: String },
    /// List calibration rounds of a project.
    List { project_id: String },
    /// List decisions recorded in a round.
    Decisions { round_id: String },
}
