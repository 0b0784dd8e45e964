use crate::cli::GlobalFlags;
use crate::commands::shared::parse::parse_verdict;
use crate::context::AppContext;
use crate::output::output;

pub async fn run(
    id: &str,
    resolver: &str,
    verdict: &str,
    reasoning: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let verdict = parse_verdict(verdict)?;
    let outcome = ctx
        .service
        .resolve_conflict(id, resolver, verdict, reasoning)
        .await?;
    if !flags.quiet {
        tracing::info!(
            conflict_id = id,
            study_id = %outcome.study.id,
            status = %outcome.study.status,
            "conflict resolved"
        );
    }
    output(&outcome, flags.format)
}
