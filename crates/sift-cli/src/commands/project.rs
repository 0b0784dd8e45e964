use crate::cli::GlobalFlags;
use crate::cli::subcommands::ProjectCommands;
use crate::commands::shared::parse::parse_phase;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift project`.
pub async fn handle(
    action: &ProjectCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        ProjectCommands::Create {
            name,
            required_reviewers,
            last_phase,
        } => {
            let defaults = &ctx.config.screening;
            let last_phase = last_phase
                .as_deref()
                .map(parse_phase)
                .transpose()?
                .unwrap_or(defaults.default_last_phase);
            let project = ctx
                .service
                .create_project(
                    name,
                    required_reviewers.unwrap_or(defaults.default_required_reviewers),
                    last_phase,
                )
                .await?;
            output(&project, flags.format)
        }
        ProjectCommands::Get { id } => output(&ctx.service.get_project(id).await?, flags.format),
        ProjectCommands::List => output(&ctx.service.list_projects().await?, flags.format),
    }
}
