//! Appointment handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::app::{AppointmentFilter, BillRequest, BookingRequest, RescheduleRequest, StatusChange};
use crate::domain::entities::{Appointment, AppointmentId, Bill, User};
use crate::error::AppError;
use crate::AppState;

/// POST /appointments
pub async fn create_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = state.appointment_service.create(&user, req).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// GET /appointments
///
/// Members see their own, artists theirs, managers their branch.
pub async fn list_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    Ok(Json(state.appointment_service.list(&user, filter).await?))
}

/// GET /appointments/:id
pub async fn get_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(
        state
            .appointment_service
            .get(&user, &AppointmentId(id))
            .await?,
    ))
}

/// PATCH /appointments/:id
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(
        state
            .appointment_service
            .reschedule(&user, &AppointmentId(id), req)
            .await?,
    ))
}

/// POST /appointments/:id/status
pub async fn change_status(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(
        state
            .appointment_service
            .change_status(&user, &AppointmentId(id), change)
            .await?,
    ))
}

/// POST /appointments/:id/bill
pub async fn create_bill(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<BillRequest>,
) -> Result<(StatusCode, Json<Bill>), AppError> {
    let bill = state
        .billing_service
        .create_bill(&user, &AppointmentId(id), req)
        .await?;
    Ok((StatusCode::CREATED, Json(bill)))
}
