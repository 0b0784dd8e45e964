use crate::cli::GlobalFlags;
use crate::cli::root_commands::StatsArgs;
use crate::commands::shared::parse::parse_phase;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift stats`.
pub async fn handle(args: &StatsArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let stats = ctx
        .service
        .phase_stats(&args.project_id, parse_phase(&args.phase)?)
        .await?;
    output(&stats, flags.format)
}
