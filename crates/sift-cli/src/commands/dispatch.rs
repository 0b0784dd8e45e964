use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(command: Commands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Project { action } => commands::project::handle(&action, ctx, flags).await,
        Commands::Member { action } => commands::member::handle(&action, ctx, flags).await,
        Commands::Study { action } => commands::study::handle(&action, ctx, flags).await,
        Commands::Decide(args) => commands::decide::handle(&args, ctx, flags).await,
        Commands::Conflict { action } => commands::conflict::handle(&action, ctx, flags).await,
        Commands::Queue(args) => commands::queue::handle(&args, ctx, flags).await,
        Commands::Reliability(args) => commands::reliability::handle(&args, ctx, flags).await,
        Commands::Calibration { action } => {
            commands::calibration::handle(&action, ctx, flags).await
        }
        Commands::Sweep(args) => commands::sweep::handle(&args, ctx, flags).await,
        Commands::Rescore(args) => commands::rescore::handle(&args, ctx, flags).await,
        Commands::Stats(args) => commands::stats::handle(&args, ctx, flags).await,
        Commands::Audit(args) => commands::audit::handle(&args, ctx, flags).await,
        Commands::Ingest { action } => commands::ingest::handle(&action, ctx, flags).await,
        Commands::Schema(args) => commands::schema::handle(&args, flags),
    }
}
