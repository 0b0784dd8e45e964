use sift_core::reliability::KappaOptions;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ReliabilityArgs;
use crate::commands::shared::parse::parse_phase;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift reliability`.
pub async fn handle(
    args: &ReliabilityArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let options = KappaOptions {
        collapse_maybe: args.collapse_maybe,
    };
    let report = ctx
        .service
        .get_reliability(&args.project_id, parse_phase(&args.phase)?, options)
        .await?;
    output(&report, flags.format)
}
