//! Projects and membership.
//!
//! Membership is the consumed collaborator behind every permission check:
//! OWNER/LEAD resolve conflicts and receive escalations, every role except
//! OBSERVER screens.

use chrono::Utc;

use sift_core::entities::{Member, Project};
use sift_core::enums::{AuditAction, EntityType, Phase, ProjectRole};
use sift_core::ids::PREFIX_PROJECT;

use crate::error::{DatabaseError, EngineError};
use crate::helpers::{collect_rows, first_row, get_int, parse_datetime, parse_enum};
use crate::retry::with_retry;
use crate::service::{Audit, SiftService};

const PROJECT_COLS: &str = "id, name, required_reviewers, last_phase, created_at";
const MEMBER_COLS: &str = "project_id, user_id, role, active, joined_at";

fn row_to_project(row: &libsql::Row) -> Result<Project, DatabaseError> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        required_reviewers: get_int(row, 2)?,
        last_phase: parse_enum(&row.get::<String>(3)?)?,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
    })
}

fn row_to_member(row: &libsql::Row) -> Result<Member, DatabaseError> {
    Ok(Member {
        project_id: row.get(0)?,
        user_id: row.get(1)?,
        role: parse_enum(&row.get::<String>(2)?)?,
        active: row.get::<i64>(3)? != 0,
        joined_at: parse_datetime(&row.get::<String>(4)?)?,
    })
}

pub(crate) async fn load_project(
    conn: &libsql::Connection,
    id: &str,
) -> Result<Project, EngineError> {
    let rows = conn
        .query(&format!("SELECT {PROJECT_COLS} FROM projects WHERE id = ?1"), [id])
        .await?;
    first_row(rows, row_to_project)
        .await?
        .ok_or_else(|| EngineError::not_found("project", id))
}

pub(crate) async fn load_member(
    conn: &libsql::Connection,
    project_id: &str,
    user_id: &str,
) -> Result<Option<Member>, EngineError> {
    let rows = conn
        .query(
            &format!("SELECT {MEMBER_COLS} FROM project_members WHERE project_id = ?1 AND user_id = ?2"),
            [project_id, user_id],
        )
        .await?;
    Ok(first_row(rows, row_to_member).await?)
}

pub(crate) async fn active_members(
    conn: &libsql::Connection,
    project_id: &str,
) -> Result<Vec<Member>, EngineError> {
    let rows = conn
        .query(
            &format!(
                "SELECT {MEMBER_COLS} FROM project_members
                 WHERE project_id = ?1 AND active = 1 ORDER BY joined_at, user_id"
            ),
            [project_id],
        )
        .await?;
    Ok(collect_rows(rows, row_to_member).await?)
}

/// The active member `user_id`, or `Forbidden` naming the missing capability.
async fn require_member(
    conn: &libsql::Connection,
    project_id: &str,
    user_id: &str,
    allowed: fn(ProjectRole) -> bool,
    capability: &str,
) -> Result<Member, EngineError> {
    match load_member(conn, project_id, user_id).await? {
        Some(member) if member.active && allowed(member.role) => Ok(member),
        Some(member) if member.active => Err(EngineError::Forbidden(format!(
            "{user_id} is {} in project {project_id} and cannot {capability}",
            member.role
        ))),
        _ => Err(EngineError::Forbidden(format!(
            "{user_id} is not an active member of project {project_id}"
        ))),
    }
}

pub(crate) async fn require_screener(
    conn: &libsql::Connection,
    project_id: &str,
    user_id: &str,
) -> Result<Member, EngineError> {
    require_member(conn, project_id, user_id, ProjectRole::can_screen, "screen studies").await
}

pub(crate) async fn require_resolver(
    conn: &libsql::Connection,
    project_id: &str,
    user_id: &str,
) -> Result<Member, EngineError> {
    require_member(conn, project_id, user_id, ProjectRole::can_resolve, "resolve conflicts").await
}

pub(crate) async fn require_participant(
    conn: &libsql::Connection,
    project_id: &str,
    user_id: &str,
) -> Result<Member, EngineError> {
    require_member(conn, project_id, user_id, |_| true, "participate").await
}

impl SiftService {
    /// Create a project requiring `required_reviewers` decisions per study/phase.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank name or zero reviewers.
    pub async fn create_project(
        &self,
        name: &str,
        required_reviewers: u32,
        last_phase: Phase,
    ) -> Result<Project, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::Validation("project name must not be empty".into()));
        }
        if required_reviewers == 0 {
            return Err(EngineError::Validation(
                "required_reviewers must be at least 1".into(),
            ));
        }

        let id = self.db().generate_id(PREFIX_PROJECT).await?;
        let project = Project {
            id,
            name: name.trim().to_string(),
            required_reviewers,
            last_phase,
            created_at: Utc::now(),
        };

        let record = &project;
        with_retry(self.retry_config(), "create_project", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self.insert_project(&tx, record).await;
            self.finish(tx, result).await
        })
        .await?;

        tracing::info!(project_id = %project.id, k = required_reviewers, "project created");
        Ok(project)
    }

    async fn insert_project(
        &self,
        tx: &libsql::Transaction,
        project: &Project,
    ) -> Result<(), EngineError> {
        tx.execute(
            "INSERT INTO projects (id, name, required_reviewers, last_phase, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            libsql::params![
                project.id.as_str(),
                project.name.as_str(),
                i64::from(project.required_reviewers),
                project.last_phase.as_str(),
                project.created_at.to_rfc3339()
            ],
        )
        .await?;
        self.append_audit(
            tx,
            Audit::new(&project.id, EntityType::Project, &project.id, AuditAction::Created)
                .detail(project)?,
        )
        .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// `NotFound` if no project has this id.
    pub async fn get_project(&self, id: &str) -> Result<Project, EngineError> {
        let _gate = self.lock_reads().await;
        load_project(self.db().conn(), id).await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>, EngineError> {
        let _gate = self.lock_reads().await;
        let rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {PROJECT_COLS} FROM projects ORDER BY created_at, rowid"),
                (),
            )
            .await?;
        Ok(collect_rows(rows, row_to_project).await?)
    }

    /// Add `user_id` to the project, or update the role of an existing
    /// member and reactivate them.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project does not exist, `Validation` for a blank user id.
    pub async fn add_member(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<Member, EngineError> {
        if user_id.trim().is_empty() {
            return Err(EngineError::Validation("user id must not be empty".into()));
        }
        with_retry(self.retry_config(), "add_member", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self.upsert_member(&tx, project_id, user_id, role).await;
            self.finish(tx, result).await
        })
        .await
    }

    async fn upsert_member(
        &self,
        tx: &libsql::Transaction,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<Member, EngineError> {
        load_project(tx, project_id).await?;
        let existed = load_member(tx, project_id, user_id).await?.is_some();

        tx.execute(
            "INSERT INTO project_members (project_id, user_id, role, active, joined_at)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(project_id, user_id) DO UPDATE SET role = excluded.role, active = 1",
            libsql::params![project_id, user_id, role.as_str(), Utc::now().to_rfc3339()],
        )
        .await?;

        let member = load_member(tx, project_id, user_id)
            .await?
            .ok_or(DatabaseError::NoResult)?;
        let action = if existed {
            AuditAction::Updated
        } else {
            AuditAction::Created
        };
        self.append_audit(
            tx,
            Audit::new(project_id, EntityType::Member, user_id, action).detail(&member)?,
        )
        .await?;
        Ok(member)
    }

    /// Activate or deactivate a member. Inactive members keep their past
    /// decisions but no longer screen, resolve or count as eligible reviewers.
    ///
    /// # Errors
    ///
    /// `NotFound` if the membership does not exist.
    pub async fn set_member_active(
        &self,
        project_id: &str,
        user_id: &str,
        active: bool,
    ) -> Result<Member, EngineError> {
        with_retry(self.retry_config(), "set_member_active", || async move {
            let (_gate, tx) = self.begin_write().await?;
            let result = self.update_member_active(&tx, project_id, user_id, active).await;
            self.finish(tx, result).await
        })
        .await
    }

    async fn update_member_active(
        &self,
        tx: &libsql::Transaction,
        project_id: &str,
        user_id: &str,
        active: bool,
    ) -> Result<Member, EngineError> {
        let changed = tx
            .execute(
                "UPDATE project_members SET active = ?1 WHERE project_id = ?2 AND user_id = ?3",
                libsql::params![i64::from(active), project_id, user_id],
            )
            .await?;
        if changed == 0 {
            return Err(EngineError::not_found(
                "member",
                format!("{project_id}/{user_id}"),
            ));
        }
        let member = load_member(tx, project_id, user_id)
            .await?
            .ok_or(DatabaseError::NoResult)?;
        self.append_audit(
            tx,
            Audit::new(project_id, EntityType::Member, user_id, AuditAction::Updated)
                .detail(&member)?,
        )
        .await?;
        Ok(member)
    }

    /// All members of a project, active or not.
    pub async fn list_members(&self, project_id: &str) -> Result<Vec<Member>, EngineError> {
        let _gate = self.lock_reads().await;
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {MEMBER_COLS} FROM project_members
                     WHERE project_id = ?1 ORDER BY joined_at, user_id"
                ),
                [project_id],
            )
            .await?;
        Ok(collect_rows(rows, row_to_member).await?)
    }
}
