//! Audit trail queries.

use sift_core::entities::AuditEntry;
use sift_core::enums::{AuditAction, EntityType};

use crate::error::{DatabaseError, EngineError};
use crate::helpers::{collect_rows, parse_datetime, parse_enum, parse_optional_json};
use crate::service::SiftService;

/// Filter for [`SiftService::query_audit`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub project_id: Option<String>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub action: Option<AuditAction>,
    pub limit: Option<u32>,
}

fn row_to_audit_entry(row: &libsql::Row) -> Result<AuditEntry, DatabaseError> {
    Ok(AuditEntry {
        id: row.get(0)?,
        project_id: row.get(1)?,
        entity_type: parse_enum(&row.get::<String>(2)?)?,
        entity_id: row.get(3)?,
        action: parse_enum(&row.get::<String>(4)?)?,
        actor_id: row.get(5)?,
        detail: parse_optional_json(row.get::<Option<String>>(6)?.as_deref())?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
    })
}

impl SiftService {
    /// Audit entries matching `filter`, newest first.
    pub async fn query_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, EngineError> {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(ref project_id) = filter.project_id {
            params.push(project_id.clone().into());
            conditions.push(format!("project_id = ?{}", params.len()));
        }
        if let Some(entity_type) = filter.entity_type {
            params.push(entity_type.as_str().into());
            conditions.push(format!("entity_type = ?{}", params.len()));
        }
        if let Some(ref entity_id) = filter.entity_id {
            params.push(entity_id.clone().into());
            conditions.push(format!("entity_id = ?{}", params.len()));
        }
        if let Some(action) = filter.action {
            params.push(action.as_str().into());
            conditions.push(format!("action = ?{}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let limit = filter.limit.unwrap_or(200);
        let sql = format!(
            "SELECT id, project_id, entity_type, entity_id, action, actor_id, detail, created_at
             FROM audit_trail {where_clause} ORDER BY created_at DESC, rowid DESC LIMIT {limit}"
        );

        let _gate = self.lock_reads().await;
        let rows = self
            .db()
            .conn()
            .query(&sql, libsql::params_from_iter(params))
            .await?;
        Ok(collect_rows(rows, row_to_audit_entry).await?)
    }
}
