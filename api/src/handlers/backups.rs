//! Backup handlers
//!
//! Boss-only. Artifacts are addressed by file name inside the backup directory.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;

use crate::backup::{BackupArtifact, BackupHeader};
use crate::domain::entities::{BackupKind, User};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBackupRequest {
    pub kind: BackupKind,
}

/// POST /admin/backups
///
/// 409 while another export is running.
pub async fn create_backup(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateBackupRequest>,
) -> Result<(StatusCode, Json<BackupArtifact>), AppError> {
    let artifact = state.backup_service.create(&user, req.kind).await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

/// GET /admin/backups
pub async fn list_backups(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<BackupArtifact>>, AppError> {
    Ok(Json(state.backup_service.list(&user).await?))
}

/// GET /admin/backups/:name
pub async fn download_backup(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let data = state.backup_service.download(&user, &name).await?;
    let disposition = format!("attachment; filename=\"{}\"", name);

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

/// DELETE /admin/backups/:name
pub async fn delete_backup(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.backup_service.delete(&user, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/backups/:name/restore
///
/// Refused with 403 when the deployment protects real data.
pub async fn restore_backup(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(name): Path<String>,
) -> Result<Json<BackupHeader>, AppError> {
    Ok(Json(state.backup_service.restore(&user, &name).await?))
}

/// POST /admin/backups/restore-upload
///
/// The request body is the artifact itself.
pub async fn restore_upload(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    body: Bytes,
) -> Result<Json<BackupHeader>, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Empty upload".to_string()));
    }
    Ok(Json(
        state
            .backup_service
            .restore_upload(&user, body.to_vec())
            .await?,
    ))
}
