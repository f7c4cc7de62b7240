//! Contact form handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::{ContactForm, ContactUpdate};
use crate::domain::entities::{Contact, ContactId, ContactStatus, User};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListContactsQuery {
    pub status: Option<ContactStatus>,
}

/// POST /contacts
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(form): Json<ContactForm>,
) -> Result<(StatusCode, Json<Contact>), AppError> {
    let contact = state.contact_service.submit(form).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

/// GET /contacts
pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListContactsQuery>,
) -> Result<Json<Vec<Contact>>, AppError> {
    Ok(Json(state.contact_service.list(&user, query.status).await?))
}

/// PATCH /contacts/:id
pub async fn update_contact(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(update): Json<ContactUpdate>,
) -> Result<Json<Contact>, AppError> {
    Ok(Json(
        state
            .contact_service
            .update_status(&user, &ContactId(id), update)
            .await?,
    ))
}
