use sift_core::enums::ProjectRole;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::MemberCommands;
use crate::commands::shared::parse::parse_enum;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift member`.
pub async fn handle(
    action: &MemberCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        MemberCommands::Add {
            project_id,
            user_id,
            role,
        } => {
            let role = parse_enum::<ProjectRole>(role, "role")?;
            let member = ctx.service.add_member(project_id, user_id, role).await?;
            output(&member, flags.format)
        }
        MemberCommands::List { project_id } => {
            output(&ctx.service.list_members(project_id).await?, flags.format)
        }
        MemberCommands::Activate {
            project_id,
            user_id,
        } => {
            let member = ctx.service.set_member_active(project_id, user_id, true).await?;
            output(&member, flags.format)
        }
        MemberCommands::Deactivate {
            project_id,
            user_id,
        } => {
            let member = ctx.service.set_member_active(project_id, user_id, false).await?;
            output(&member, flags.format)
        }
    }
}
