use serde_json::json;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::IngestCommands;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift ingest`.
pub async fn handle(
    action: &IngestCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        IngestCommands::Dispatch => {
            let dispatched = ctx.service.dispatch_pending_ingestion().await?;
            output(&json!({ "dispatched": dispatched }), flags.format)
        }
        IngestCommands::List { project_id } => {
            output(&ctx.service.list_ingestion_signals(project_id).await?, flags.format)
        }
    }
}
