use serde_json::json;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::CalibrationCommands;
use crate::commands::shared::parse::{parse_phase, parse_verdict};
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift calibration`.
pub async fn handle(
    action: &CalibrationCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        CalibrationCommands::Create {
            project_id,
            phase,
            sample_size,
            target,
        } => {
            let round = ctx
                .service
                .create_calibration_round(project_id, parse_phase(phase)?, *sample_size, *target)
                .await?;
            output(&round, flags.format)
        }
        CalibrationCommands::Decide {
            round_id,
            reviewer,
            study,
            verdict,
            reasoning,
        } => {
            let round = ctx
                .service
                .submit_calibration_decision(
                    round_id,
                    reviewer,
                    study,
                    parse_verdict(verdict)?,
                    reasoning.as_deref(),
                )
                .await?;
            output(&round, flags.format)
        }
        CalibrationCommands::Get { id } => {
            let round = ctx.service.get_calibration_round(id).await?;
            let decisions = ctx.service.list_calibration_decisions(id).await?;
            output(
                &json!({
                    "round": round,
                    "decisions": decisions,
                }),
                flags.format,
            )
        }
        CalibrationCommands::List { project_id } => {
            output(&ctx.service.list_calibration_rounds(project_id).await?, flags.format)
        }
        CalibrationCommands::Decisions { round_id } => {
            output(&ctx.service.list_calibration_decisions(round_id).await?, flags.format)
        }
    }
}
