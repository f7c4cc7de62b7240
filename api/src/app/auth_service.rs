//! Authentication service
//!
//! Registration, login, token refresh and password changes.

use std::sync::Arc;

use serde::Serialize;

use crate::app::validation::{normalize_email, optional_text, required_text};
use crate::auth::{
    hash_password, validate_password, verify_password, TokenIssuer, TokenKind, TokenPair,
};
use crate::domain::entities::{NewMember, NewUser, Role, User, UserId};
use crate::domain::ports::{MemberRepository, UserRepository};
use crate::error::{AppError, DomainError};

/// Tokens plus the signed-in user
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
}

/// Service for signing users in
pub struct AuthService<UR, MR>
where
    UR: UserRepository,
    MR: MemberRepository,
{
    users: Arc<UR>,
    members: Arc<MR>,
    tokens: TokenIssuer,
}

impl<UR, MR> AuthService<UR, MR>
where
    UR: UserRepository + 'static,
    MR: MemberRepository,
{
    pub fn new(users: Arc<UR>, members: Arc<MR>, tokens: TokenIssuer) -> Self {
        Self {
            users,
            members,
            tokens,
        }
    }

    /// Create a member account and sign it in
    pub async fn register(&self, registration: Registration) -> Result<AuthSession, AppError> {
        let email = normalize_email(&registration.email)?;
        let name = required_text("Name", &registration.name, 100)?;
        validate_password(&registration.password)?;
        let phone = optional_text(registration.phone.as_deref());

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(DomainError::AlreadyExists(format!(
                "Email {} is already registered",
                email
            ))
            .into());
        }
        if let Some(phone) = &phone {
            if self.users.find_by_phone(phone).await?.is_some() {
                return Err(
                    DomainError::AlreadyExists("Phone number is already registered".to_string())
                        .into(),
                );
            }
        }

        let user = self
            .users
            .create(&NewUser {
                email,
                phone: phone.clone(),
                password_hash: hash_password(&registration.password)?,
                name: name.clone(),
                role: Role::Member,
                branch_id: None,
            })
            .await?;

        self.members
            .create(&NewMember {
                user_id: user.id,
                name,
                phone,
                birthday: None,
            })
            .await?;

        tracing::info!(user_id = %user.id, "Member registered");

        Ok(AuthSession {
            tokens: self.tokens.issue(&user)?,
            user,
        })
    }

    /// Sign in with an email address or phone number
    pub async fn login(&self, identifier: &str, password: &str) -> Result<AuthSession, AppError> {
        let identifier = identifier.trim();
        let user = if identifier.contains('@') {
            self.users.find_by_email(&identifier.to_lowercase()).await?
        } else {
            self.users.find_by_phone(identifier).await?
        };

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash) => user,
            _ => return Err(AppError::Unauthorized),
        };

        if !user.is_active {
            return Err(DomainError::Forbidden("Account is disabled".to_string()).into());
        }

        let users = self.users.clone();
        let user_id = user.id;
        tokio::spawn(async move {
            if let Err(e) = users.touch_last_login(&user_id).await {
                tracing::warn!(error = %e, user_id = %user_id, "Failed to update last_login_at");
            }
        });

        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok(AuthSession {
            tokens: self.tokens.issue(&user)?,
            user,
        })
    }

    /// Exchange a refresh token for a new pair
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AppError> {
        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh)?;
        let user = self.active_user(&claims.user_id()).await?;

        Ok(AuthSession {
            tokens: self.tokens.issue(&user)?,
            user,
        })
    }

    /// Resolve the user behind an access token
    pub async fn authenticate(&self, access_token: &str) -> Result<User, AppError> {
        let claims = self.tokens.verify(access_token, TokenKind::Access)?;
        self.active_user(&claims.user_id()).await
    }

    pub async fn change_password(
        &self,
        user: &User,
        current: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if !verify_password(current, &user.password_hash) {
            return Err(
                DomainError::Unauthorized("Current password is incorrect".to_string()).into(),
            );
        }
        validate_password(new_password)?;

        self.users
            .update_password(&user.id, &hash_password(new_password)?)
            .await?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    async fn active_user(&self, id: &UserId) -> Result<User, AppError> {
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !user.is_active {
            return Err(DomainError::Forbidden("Account is disabled".to_string()).into());
        }
        Ok(user)
    }
}
