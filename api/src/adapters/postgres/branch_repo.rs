//! PostgreSQL adapter for BranchRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::utc;
use crate::domain::entities::{Branch, BranchChanges, BranchId, NewBranch};
use crate::domain::ports::BranchRepository;
use crate::entity::branches;
use crate::error::DomainError;

/// PostgreSQL implementation of BranchRepository
pub struct PostgresBranchRepository {
    db: DatabaseConnection,
}

impl PostgresBranchRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BranchRepository for PostgresBranchRepository {
    async fn find_by_id(&self, id: &BranchId) -> Result<Option<Branch>, DomainError> {
        let result = branches::Entity::find_by_id(id.0).one(&self.db).await?;
        Ok(result.map(|m| m.into()))
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Branch>, DomainError> {
        let mut query = branches::Entity::find().order_by_asc(branches::Column::Name);
        if !include_inactive {
            query = query.filter(branches::Column::IsActive.eq(true));
        }

        let results = query.all(&self.db).await?;
        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn create(&self, branch: &NewBranch) -> Result<Branch, DomainError> {
        let model = branches::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(branch.name.clone()),
            address: Set(branch.address.clone()),
            phone: Set(branch.phone.clone()),
            business_hours: Set(branch.business_hours.clone()),
            is_active: Set(true),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = model.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn update(
        &self,
        id: &BranchId,
        changes: &BranchChanges,
    ) -> Result<Branch, DomainError> {
        let mut model = branches::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Branch {} not found", id)))?
            .into_active_model();

        if let Some(name) = &changes.name {
            model.name = Set(name.clone());
        }
        if let Some(address) = &changes.address {
            model.address = Set(address.clone());
        }
        if let Some(phone) = &changes.phone {
            model.phone = Set(phone.clone());
        }
        if let Some(hours) = &changes.business_hours {
            model.business_hours = Set(hours.clone());
        }
        if let Some(is_active) = changes.is_active {
            model.is_active = Set(is_active);
        }

        let result = model.update(&self.db).await?;
        Ok(result.into())
    }
}

impl From<branches::Model> for Branch {
    fn from(model: branches::Model) -> Self {
        Branch {
            id: BranchId(model.id),
            name: model.name,
            address: model.address,
            phone: model.phone,
            business_hours: model.business_hours,
            is_active: model.is_active,
            created_at: utc(model.created_at),
        }
    }
}
