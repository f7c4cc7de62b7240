//! Artist and portfolio handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::{ArtistInput, ArtistProfile, ArtistUpdate, PortfolioInput, PortfolioUpdate};
use crate::domain::entities::{Artist, ArtistId, BranchId, PortfolioItem, PortfolioItemId, User};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListArtistsQuery {
    pub branch_id: Option<BranchId>,
}

/// GET /artists
pub async fn list_artists(
    State(state): State<AppState>,
    Query(query): Query<ListArtistsQuery>,
) -> Result<Json<Vec<Artist>>, AppError> {
    Ok(Json(state.artist_service.list(query.branch_id).await?))
}

/// GET /artists/:id
///
/// The artist and admins of the branch also see private portfolio items.
pub async fn get_artist(
    State(state): State<AppState>,
    viewer: Option<Extension<User>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ArtistProfile>, AppError> {
    let viewer = viewer.map(|Extension(u)| u);
    Ok(Json(
        state
            .artist_service
            .profile(viewer.as_ref(), &ArtistId(id))
            .await?,
    ))
}

/// POST /artists
pub async fn create_artist(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(input): Json<ArtistInput>,
) -> Result<(StatusCode, Json<Artist>), AppError> {
    let artist = state.artist_service.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(artist)))
}

/// PATCH /artists/:id
pub async fn update_artist(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(update): Json<ArtistUpdate>,
) -> Result<Json<Artist>, AppError> {
    Ok(Json(
        state
            .artist_service
            .update(&user, &ArtistId(id), update)
            .await?,
    ))
}

/// POST /artists/:id/portfolio
pub async fn add_portfolio_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(input): Json<PortfolioInput>,
) -> Result<(StatusCode, Json<PortfolioItem>), AppError> {
    let item = state
        .artist_service
        .add_portfolio_item(&user, &ArtistId(id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /portfolio/:id
pub async fn update_portfolio_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(update): Json<PortfolioUpdate>,
) -> Result<Json<PortfolioItem>, AppError> {
    Ok(Json(
        state
            .artist_service
            .update_portfolio_item(&user, &PortfolioItemId(id), update)
            .await?,
    ))
}

/// DELETE /portfolio/:id
pub async fn delete_portfolio_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .artist_service
        .delete_portfolio_item(&user, &PortfolioItemId(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
