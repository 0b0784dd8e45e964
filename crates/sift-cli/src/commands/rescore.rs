use chrono::Datelike;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::RescoreArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift rescore`.
pub async fn handle(args: &RescoreArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let year = args.year.unwrap_or_else(|| chrono::Utc::now().year());
    let report = ctx
        .service
        .rescore_priorities(&args.project_id, &ctx.config.priority, year)
        .await?;
    output(&report, flags.format)
}
