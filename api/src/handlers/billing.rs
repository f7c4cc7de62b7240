//! Bill, installment and payment handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::{BillFilter, InstallmentRequest, OverdueInstallment, PaymentRequest};
use crate::domain::entities::{Bill, BillId, BranchId, Installment, Payment, User};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OverdueQuery {
    pub branch_id: Option<BranchId>,
}

/// GET /bills
pub async fn list_bills(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(filter): Query<BillFilter>,
) -> Result<Json<Vec<Bill>>, AppError> {
    Ok(Json(state.billing_service.list(&user, filter).await?))
}

/// GET /bills/overdue
pub async fn list_overdue(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<OverdueQuery>,
) -> Result<Json<Vec<OverdueInstallment>>, AppError> {
    Ok(Json(
        state.billing_service.overdue(&user, query.branch_id).await?,
    ))
}

/// GET /bills/:id
pub async fn get_bill(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Bill>, AppError> {
    Ok(Json(state.billing_service.get(&user, &BillId(id)).await?))
}

/// GET /bills/:id/payments
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(
        state.billing_service.payments(&user, &BillId(id)).await?,
    ))
}

/// POST /bills/:id/installments
pub async fn create_installments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<InstallmentRequest>,
) -> Result<(StatusCode, Json<Vec<Installment>>), AppError> {
    let installments = state
        .billing_service
        .create_installments(&user, &BillId(id), req)
        .await?;
    Ok((StatusCode::CREATED, Json(installments)))
}

/// POST /bills/:id/payments
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let payment = state
        .billing_service
        .record_payment(&user, &BillId(id), req)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// POST /bills/:id/void
pub async fn void_bill(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Bill>, AppError> {
    Ok(Json(state.billing_service.void(&user, &BillId(id)).await?))
}
