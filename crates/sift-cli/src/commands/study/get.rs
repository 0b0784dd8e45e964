use serde_json::json;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

pub async fn run(id: &str, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let study = ctx.service.get_study(id).await?;
    let work = ctx.service.get_work(&study.work_id).await?;
    let decisions = ctx.service.list_decisions(id, None).await?;

    output(
        &json!({
            "study": study,
            "work": work,
            "decisions": decisions,
        }),
        flags.format,
    )
}
