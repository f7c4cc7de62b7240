//! Notification handlers
//!
//! Every route works on the caller's own notifications.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{Notification, NotificationId, User};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: u64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

/// GET /notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(
        state
            .notification_service
            .list(&user.id, query.unread_only, query.limit)
            .await?,
    ))
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<UnreadCount>, AppError> {
    let unread = state.notification_service.unread_count(&user.id).await?;
    Ok(Json(UnreadCount { unread }))
}

/// POST /notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .notification_service
        .mark_read(&user.id, &NotificationId(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<MarkedRead>, AppError> {
    let updated = state.notification_service.mark_all_read(&user.id).await?;
    Ok(Json(MarkedRead { updated }))
}
