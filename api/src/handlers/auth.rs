//! Auth handlers
//!
//! Registration, login, token refresh and the signed-in account.

use axum::{extract::State, http::HeaderMap, http::StatusCode, Extension, Json};
use serde::Deserialize;

use crate::app::{AuthSession, Registration};
use crate::domain::entities::User;
use crate::error::AppError;
use crate::handlers::cart::guest_token;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address or phone number
    #[serde(alias = "email", alias = "phone")]
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthSession>), AppError> {
    let session = state
        .auth_service
        .register(Registration {
            email: req.email,
            password: req.password,
            name: req.name,
            phone: req.phone,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /auth/login
///
/// A guest cart named by `X-Cart-Token` is merged into the account's cart.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthSession>, AppError> {
    let session = state
        .auth_service
        .login(&req.identifier, &req.password)
        .await?;

    if let Some(token) = guest_token(&headers) {
        if let Err(e) = state.cart_service.merge_guest(&token, session.user.id).await {
            tracing::warn!(error = %e, user_id = %session.user.id, "Failed to merge guest cart");
        }
    }

    Ok(Json(session))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<AuthSession>, AppError> {
    Ok(Json(state.auth_service.refresh(&req.refresh_token).await?))
}

/// GET /auth/me
pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// POST /auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    state
        .auth_service
        .change_password(&user, &req.current_password, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
