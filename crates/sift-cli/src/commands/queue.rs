use sift_core::enums::QueueStrategy;
use sift_db::repos::queue::QueueRequest;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::QueueArgs;
use crate::commands::shared::limit::effective_limit;
use crate::commands::shared::parse::{parse_enum, parse_phase};
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift queue`.
pub async fn handle(args: &QueueArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let strategy = parse_enum::<QueueStrategy>(&args.strategy, "strategy")?;
    let mut request = QueueRequest::new(&args.project_id, &args.reviewer, parse_phase(&args.phase)?)
        .strategy(strategy);
    request.limit = Some(effective_limit(
        None,
        flags.limit,
        ctx.config.screening.queue_limit,
    ));
    request.seed = args.seed;

    let studies = ctx.service.get_queue(&request).await?;
    output(&studies, flags.format)
}
