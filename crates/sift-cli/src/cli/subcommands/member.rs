use clap::Subcommand;

/// Project membership commands.
#[derive(Clone, Debug, Subcommand)]
pub enum MemberCommands {
    /// Add a member (or update the role of an existing one).
    Add {
        project_id: String,
        user_id: String,
        /// owner, lead, reviewer, observer
        #[arg(long, default_value = "reviewer")]
        role: String,
    },
    /// List members of a project.
    List { project_id: String },
    /// Mark a member active again.
    Activate { project_id: String, user_id: String },
    /// Mark a member inactive.
    Deactivate { project_id: String, user_id: String },
}
