//! Staff administration handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::{StaffAccount, StaffUpdate};
use crate::domain::entities::{BranchId, User, UserId};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub branch_id: Option<BranchId>,
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.user_service.list(&user, query.branch_id).await?))
}

/// POST /admin/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(account): Json<StaffAccount>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let created = state.user_service.create(&user, account).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /admin/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(update): Json<StaffUpdate>,
) -> Result<Json<User>, AppError> {
    Ok(Json(
        state.user_service.update(&user, &UserId(id), update).await?,
    ))
}
