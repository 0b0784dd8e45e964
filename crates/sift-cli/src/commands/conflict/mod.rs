mod get;
mod resolve;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::ConflictCommands;
use crate::commands::shared::parse::parse_phase;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift conflict`.
pub async fn handle(
    action: &ConflictCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        ConflictCommands::Open {
            study_id,
            phase,
            actor,
        } => {
            let conflict = ctx
                .service
                .open_conflict(study_id, parse_phase(phase)?, actor)
                .await?;
            output(&conflict, flags.format)
        }
        ConflictCommands::List { project_id } => {
            output(&ctx.service.list_open_conflicts(project_id).await?, flags.format)
        }
        ConflictCommands::Get { id } => get::run(id, ctx, flags).await,
        ConflictCommands::Discuss { id, user } => {
            output(&ctx.service.start_discussion(id, user).await?, flags.format)
        }
        ConflictCommands::Escalate { id, by, reason } => {
            output(&ctx.service.escalate_conflict(id, by, reason).await?, flags.format)
        }
        ConflictCommands::Resolve {
            id,
            resolver,
            verdict,
            reasoning,
        } => resolve::run(id, resolver, verdict, reasoning, ctx, flags).await,
    }
}
