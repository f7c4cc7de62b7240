//! Administration handlers: audit trail and dashboard

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::app::{DashboardQuery, DashboardSummary};
use crate::auth::require_role;
use crate::domain::entities::{AuditLog, AuditLogQuery, Role, User, UserId};
use crate::error::AppError;
use crate::AppState;

/// Query parameters for the audit trail
#[derive(Debug, Deserialize)]
pub struct AuditLogParams {
    pub actor_id: Option<UserId>,
    pub entity_type: Option<String>,
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

/// GET /admin/audit-logs
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(params): Query<AuditLogParams>,
) -> Result<Json<Vec<AuditLog>>, AppError> {
    require_role(&user, &[Role::Boss])?;

    let logs = state
        .audit_service
        .list(AuditLogQuery {
            actor_id: params.actor_id,
            entity_type: params.entity_type,
            action: params.action,
            from: params.from,
            to: params.to,
            limit: params.limit,
            offset: params.offset,
        })
        .await?;
    Ok(Json(logs))
}

/// GET /admin/dashboard
///
/// Defaults to the current calendar month; managers always get their own branch.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardSummary>, AppError> {
    Ok(Json(state.dashboard_service.summary(&user, query).await?))
}
