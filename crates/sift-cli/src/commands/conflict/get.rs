use serde_json::json;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

pub async fn run(id: &str, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let conflict = ctx.service.get_conflict(id).await?;
    let resolution = ctx.service.get_resolution(id).await?;

    output(
        &json!({
            "conflict": conflict,
            "resolution": resolution,
        }),
        flags.format,
    )
}
