//! Maintenance mode handlers and request gate

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::app::{MaintenanceRequest, MaintenanceService, MaintenanceStatus};
use crate::auth::require_role;
use crate::domain::entities::{Role, User};
use crate::domain::ports::{AuditLogRepository, SettingsRepository};
use crate::error::AppError;
use crate::AppState;

/// Routes that stay reachable while maintenance mode is on
const ESSENTIAL_ROUTES: &[&str] = &[
    "/health",
    "/auth/login",
    "/auth/refresh",
    "/admin/maintenance",
    "/admin/backups",
];

/// Whether `path` is an essential route or nested below one
pub fn is_essential(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    ESSENTIAL_ROUTES.iter().any(|route| {
        path == *route
            || path
                .strip_prefix(route)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Answer 503 for everything but the essential routes while maintenance is on
pub async fn maintenance_gate<SR, AL>(
    State(maintenance): State<Arc<MaintenanceService<SR, AL>>>,
    request: Request<Body>,
    next: Next,
) -> Response
where
    SR: SettingsRepository + 'static,
    AL: AuditLogRepository + 'static,
{
    if is_essential(request.uri().path()) || !maintenance.is_enabled().await {
        return next.run(request).await;
    }

    let status = maintenance.status().await;
    tracing::debug!(path = %request.uri().path(), "Rejected during maintenance");
    AppError::ServiceUnavailable(status.message).into_response()
}

/// GET /admin/maintenance
pub async fn get_maintenance(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<MaintenanceStatus>, AppError> {
    require_role(&user, &[Role::Boss])?;
    Ok(Json(state.maintenance_service.status().await))
}

/// POST /admin/maintenance
pub async fn set_maintenance(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<MaintenanceRequest>,
) -> Result<Json<MaintenanceStatus>, AppError> {
    Ok(Json(state.maintenance_service.set(&user, req).await?))
}
