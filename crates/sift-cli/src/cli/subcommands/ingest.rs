use clap::Subcommand;

/// Ingestion signal commands.
#[derive(Clone, Debug, Subcommand)]
pub enum IngestCommands {
    /// Deliver undispatched ingestion signals.
    Dispatch,
    /// List ingestion signals of a project.
    List { project_id: String },
}
