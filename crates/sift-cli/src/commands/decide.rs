use sift_core::entities::NewDecision;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::DecideArgs;
use crate::commands::shared::parse::{parse_phase, parse_verdict};
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift decide`.
pub async fn handle(args: &DecideArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let phase = parse_phase(&args.phase)?;
    let input = NewDecision {
        reviewer_id: args.reviewer.clone(),
        verdict: parse_verdict(&args.verdict)?,
        reasoning: args.reasoning.clone(),
        exclusion_reason: args.exclusion_reason.clone(),
        confidence: args.confidence,
        time_spent_ms: args.time_spent_ms,
    };

    let outcome = ctx
        .service
        .submit_decision(&args.study_id, phase, &input)
        .await?;
    output(&outcome, flags.format)
}
