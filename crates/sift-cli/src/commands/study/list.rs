use sift_core::enums::StudyStatus;
use sift_db::repos::study::StudyFilter;

use crate::cli::GlobalFlags;
use crate::commands::shared::limit::effective_limit;
use crate::commands::shared::parse::{parse_enum, parse_phase};
use crate::context::AppContext;
use crate::output::output;

pub async fn run(
    project_id: &str,
    phase: Option<&str>,
    status: Option<&str>,
    limit: Option<u32>,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let filter = StudyFilter {
        phase: phase.map(parse_phase).transpose()?,
        status: status
            .map(|value| parse_enum::<StudyStatus>(value, "status"))
            .transpose()?,
        limit: Some(effective_limit(limit, flags.limit, 200)),
    };
    let studies = ctx.service.list_studies(project_id, &filter).await?;
    output(&studies, flags.format)
}
