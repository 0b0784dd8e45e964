mod add;
mod assess;
mod get;
mod list;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::StudyCommands;
use crate::commands::shared::parse::parse_phase;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift study`.
pub async fn handle(
    action: &StudyCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        StudyCommands::Add {
            project_id,
            title,
            abstract_text,
            journal,
            year,
            keyword,
        } => {
            add::run(
                project_id,
                add::WorkArgs {
                    title,
                    abstract_text: abstract_text.as_deref(),
                    journal: journal.as_deref(),
                    year: *year,
                    keywords: keyword,
                },
                ctx,
                flags,
            )
            .await
        }
        StudyCommands::Get { id } => get::run(id, ctx, flags).await,
        StudyCommands::List {
            project_id,
            phase,
            status,
            limit,
        } => {
            list::run(
                project_id,
                phase.as_deref(),
                status.as_deref(),
                *limit,
                ctx,
                flags,
            )
            .await
        }
        StudyCommands::Assess {
            id,
            suggestion,
            confidence,
            reasoning,
        } => assess::run(id, suggestion, *confidence, reasoning.as_deref(), ctx, flags).await,
        StudyCommands::Decisions { id, phase } => {
            let phase = phase.as_deref().map(parse_phase).transpose()?;
            output(&ctx.service.list_decisions(id, phase).await?, flags.format)
        }
    }
}
