//! Branch, service catalog and pricing handlers
//!
//! Reads are public. Writes require a boss, checked by the catalog service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::{
    BranchInput, BranchUpdate, PriceBreakdown, PriceRequest, ServiceInput, ServiceUpdate,
    VariantInput, VariantUpdate,
};
use crate::domain::entities::{
    Branch, BranchId, Service, ServiceId, ServiceVariant, ServiceWithVariants, User, VariantId,
};
use crate::error::AppError;
use crate::AppState;

/// GET /branches
pub async fn list_branches(State(state): State<AppState>) -> Result<Json<Vec<Branch>>, AppError> {
    Ok(Json(state.catalog_service.list_branches(false).await?))
}

/// GET /branches/:id
pub async fn get_branch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Branch>, AppError> {
    Ok(Json(
        state.catalog_service.get_branch(&BranchId(id), false).await?,
    ))
}

/// POST /branches
pub async fn create_branch(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(input): Json<BranchInput>,
) -> Result<(StatusCode, Json<Branch>), AppError> {
    let branch = state.catalog_service.create_branch(&user, input).await?;
    Ok((StatusCode::CREATED, Json(branch)))
}

/// PATCH /branches/:id
pub async fn update_branch(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(update): Json<BranchUpdate>,
) -> Result<Json<Branch>, AppError> {
    Ok(Json(
        state
            .catalog_service
            .update_branch(&user, &BranchId(id), update)
            .await?,
    ))
}

/// DELETE /branches/:id
///
/// Soft delete: the branch is deactivated.
pub async fn delete_branch(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Branch>, AppError> {
    Ok(Json(
        state
            .catalog_service
            .deactivate_branch(&user, &BranchId(id))
            .await?,
    ))
}

/// GET /services
pub async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceWithVariants>>, AppError> {
    Ok(Json(state.catalog_service.list_services(false).await?))
}

/// GET /services/:id
pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceWithVariants>, AppError> {
    Ok(Json(
        state.catalog_service.get_service(&ServiceId(id), false).await?,
    ))
}

/// POST /services
pub async fn create_service(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(input): Json<ServiceInput>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    let service = state.catalog_service.create_service(&user, input).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// PATCH /services/:id
pub async fn update_service(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(update): Json<ServiceUpdate>,
) -> Result<Json<Service>, AppError> {
    Ok(Json(
        state
            .catalog_service
            .update_service(&user, &ServiceId(id), update)
            .await?,
    ))
}

/// DELETE /services/:id
pub async fn delete_service(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Service>, AppError> {
    Ok(Json(
        state
            .catalog_service
            .deactivate_service(&user, &ServiceId(id))
            .await?,
    ))
}

/// POST /services/:id/variants
pub async fn create_variant(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(input): Json<VariantInput>,
) -> Result<(StatusCode, Json<ServiceVariant>), AppError> {
    let variant = state
        .catalog_service
        .create_variant(&user, &ServiceId(id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

/// PATCH /variants/:id
pub async fn update_variant(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(update): Json<VariantUpdate>,
) -> Result<Json<ServiceVariant>, AppError> {
    Ok(Json(
        state
            .catalog_service
            .update_variant(&user, &VariantId(id), update)
            .await?,
    ))
}

/// DELETE /variants/:id
pub async fn delete_variant(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .catalog_service
        .delete_variant(&user, &VariantId(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub service_id: ServiceId,
    #[serde(flatten)]
    pub price: PriceRequest,
}

/// POST /pricing/quote
pub async fn quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<PriceBreakdown>, AppError> {
    Ok(Json(
        state
            .catalog_service
            .quote(&req.service_id, &req.price)
            .await?,
    ))
}
