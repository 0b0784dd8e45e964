use sift_core::entities::AiAssessment;

use crate::cli::GlobalFlags;
use crate::commands::shared::parse::parse_verdict;
use crate::context::AppContext;
use crate::output::output;

pub async fn run(
    id: &str,
    suggestion: &str,
    confidence: f64,
    reasoning: Option<&str>,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let assessment = AiAssessment {
        suggestion: parse_verdict(suggestion)?,
        confidence,
        reasoning: reasoning.map(str::to_string),
    };
    let study = ctx.service.record_ai_assessment(id, &assessment).await?;
    output(&study, flags.format)
}
