use crate::cli::GlobalFlags;
use crate::cli::root_commands::SweepArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift sweep`.
pub async fn handle(args: &SweepArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let report = ctx.service.sweep(args.project.as_deref()).await?;
    output(&report, flags.format)
}
