//! Member handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::{PointsAdjustment, ProfileUpdate};
use crate::domain::entities::{Bill, Member, MemberId, MemberQuery, User};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchMembersQuery {
    /// Matches name, phone or email
    pub q: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    pub notes: Option<String>,
}

/// GET /members/me
pub async fn get_me(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Member>, AppError> {
    Ok(Json(state.member_service.me(&user).await?))
}

/// PATCH /members/me
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Member>, AppError> {
    Ok(Json(state.member_service.update_me(&user, update).await?))
}

/// GET /members/me/bills
pub async fn my_bills(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Bill>>, AppError> {
    Ok(Json(state.billing_service.member_bills(&user).await?))
}

/// GET /members
pub async fn search_members(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<SearchMembersQuery>,
) -> Result<Json<Vec<Member>>, AppError> {
    let members = state
        .member_service
        .search(
            &user,
            MemberQuery {
                search: query.q,
                limit: query.limit,
                offset: query.offset,
            },
        )
        .await?;
    Ok(Json(members))
}

/// GET /members/:id
pub async fn get_member(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Member>, AppError> {
    Ok(Json(state.member_service.get(&user, &MemberId(id)).await?))
}

/// PATCH /members/:id/notes
pub async fn update_notes(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<NotesRequest>,
) -> Result<Json<Member>, AppError> {
    Ok(Json(
        state
            .member_service
            .update_notes(&user, &MemberId(id), req.notes)
            .await?,
    ))
}

/// POST /members/:id/points
pub async fn adjust_points(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(adjustment): Json<PointsAdjustment>,
) -> Result<Json<Member>, AppError> {
    Ok(Json(
        state
            .member_service
            .adjust_points(&user, &MemberId(id), adjustment)
            .await?,
    ))
}
