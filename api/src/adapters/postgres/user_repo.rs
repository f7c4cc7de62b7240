//! PostgreSQL adapter for UserRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::{parse_or, utc};
use crate::domain::entities::{BranchId, NewUser, Role, User, UserChanges, UserId};
use crate::domain::ports::UserRepository;
use crate::entity::users;
use crate::error::DomainError;

/// PostgreSQL implementation of UserRepository
pub struct PostgresUserRepository {
    db: DatabaseConnection,
}

impl PostgresUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn model(&self, id: &UserId) -> Result<users::Model, DomainError> {
        users::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("User {} not found", id)))
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let result = users::Entity::find_by_id(id.0).one(&self.db).await?;
        Ok(result.map(|m| m.into()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let result = users::Entity::find()
            .filter(users::Column::Email.eq(email.to_lowercase()))
            .one(&self.db)
            .await?;
        Ok(result.map(|m| m.into()))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, DomainError> {
        let result = users::Entity::find()
            .filter(users::Column::Phone.eq(phone))
            .one(&self.db)
            .await?;
        Ok(result.map(|m| m.into()))
    }

    async fn create(&self, user: &NewUser) -> Result<User, DomainError> {
        let model = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(user.email.to_lowercase()),
            phone: Set(user.phone.clone()),
            password_hash: Set(user.password_hash.clone()),
            name: Set(user.name.clone()),
            role: Set(user.role.to_string()),
            branch_id: Set(user.branch_id.map(|b| b.0)),
            is_active: Set(true),
            created_at: Set(Utc::now().fixed_offset()),
            last_login_at: Set(None),
        };

        let result = model.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn update(&self, id: &UserId, changes: &UserChanges) -> Result<User, DomainError> {
        let mut model = self.model(id).await?.into_active_model();

        if let Some(name) = &changes.name {
            model.name = Set(name.clone());
        }
        if let Some(phone) = &changes.phone {
            model.phone = Set(phone.clone());
        }
        if let Some(role) = changes.role {
            model.role = Set(role.to_string());
        }
        if let Some(branch_id) = changes.branch_id {
            model.branch_id = Set(branch_id.map(|b| b.0));
        }
        if let Some(is_active) = changes.is_active {
            model.is_active = Set(is_active);
        }

        let result = model.update(&self.db).await?;
        Ok(result.into())
    }

    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), DomainError> {
        users::ActiveModel {
            id: Set(id.0),
            password_hash: Set(password_hash.to_string()),
            ..Default::default()
        }
        .update(&self.db)
        .await?;

        Ok(())
    }

    async fn touch_last_login(&self, id: &UserId) -> Result<(), DomainError> {
        users::ActiveModel {
            id: Set(id.0),
            last_login_at: Set(Some(Utc::now().fixed_offset())),
            ..Default::default()
        }
        .update(&self.db)
        .await?;

        Ok(())
    }

    async fn list(&self, branch_id: Option<&BranchId>) -> Result<Vec<User>, DomainError> {
        let mut query = users::Entity::find().order_by_asc(users::Column::Name);
        if let Some(branch_id) = branch_id {
            query = query.filter(users::Column::BranchId.eq(branch_id.0));
        }

        let results = query.all(&self.db).await?;
        Ok(results.into_iter().map(|m| m.into()).collect())
    }
}

/// Convert SeaORM model to domain entity
impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        User {
            id: UserId(model.id),
            email: model.email,
            phone: model.phone,
            password_hash: model.password_hash,
            name: model.name,
            role: parse_or(&model.role, Role::Member),
            branch_id: model.branch_id.map(BranchId),
            is_active: model.is_active,
            created_at: utc(model.created_at),
            last_login_at: model.last_login_at.map(utc),
        }
    }
}
