//! PostgreSQL adapter for ServiceRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::{parse_or, utc};
use crate::domain::entities::{
    NewService, NewServiceVariant, Service, ServiceChanges, ServiceId, ServiceVariant,
    VariantChanges, VariantId, VariantKind,
};
use crate::domain::ports::ServiceRepository;
use crate::entity::{service_variants, services};
use crate::error::DomainError;

/// PostgreSQL implementation of ServiceRepository
pub struct PostgresServiceRepository {
    db: DatabaseConnection,
}

impl PostgresServiceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ServiceRepository for PostgresServiceRepository {
    async fn find_by_id(&self, id: &ServiceId) -> Result<Option<Service>, DomainError> {
        let result = services::Entity::find_by_id(id.0).one(&self.db).await?;
        Ok(result.map(|m| m.into()))
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Service>, DomainError> {
        let mut query = services::Entity::find()
            .order_by_asc(services::Column::SortOrder)
            .order_by_asc(services::Column::Name);
        if !include_inactive {
            query = query.filter(services::Column::IsActive.eq(true));
        }

        let results = query.all(&self.db).await?;
        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn create(&self, service: &NewService) -> Result<Service, DomainError> {
        let model = services::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(service.name.clone()),
            description: Set(service.description.clone()),
            category: Set(service.category.clone()),
            base_price: Set(service.base_price),
            duration_minutes: Set(service.duration_minutes),
            is_active: Set(true),
            sort_order: Set(service.sort_order),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = model.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn update(
        &self,
        id: &ServiceId,
        changes: &ServiceChanges,
    ) -> Result<Service, DomainError> {
        let mut model = services::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Service {} not found", id)))?
            .into_active_model();

        if let Some(name) = &changes.name {
            model.name = Set(name.clone());
        }
        if let Some(description) = &changes.description {
            model.description = Set(description.clone());
        }
        if let Some(category) = &changes.category {
            model.category = Set(category.clone());
        }
        if let Some(base_price) = changes.base_price {
            model.base_price = Set(base_price);
        }
        if let Some(duration) = changes.duration_minutes {
            model.duration_minutes = Set(duration);
        }
        if let Some(is_active) = changes.is_active {
            model.is_active = Set(is_active);
        }
        if let Some(sort_order) = changes.sort_order {
            model.sort_order = Set(sort_order);
        }

        let result = model.update(&self.db).await?;
        Ok(result.into())
    }

    async fn variants_for(
        &self,
        service_id: &ServiceId,
    ) -> Result<Vec<ServiceVariant>, DomainError> {
        let results = service_variants::Entity::find()
            .filter(service_variants::Column::ServiceId.eq(service_id.0))
            .order_by_asc(service_variants::Column::SortOrder)
            .all(&self.db)
            .await?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn find_variant(&self, id: &VariantId) -> Result<Option<ServiceVariant>, DomainError> {
        let result = service_variants::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?;
        Ok(result.map(|m| m.into()))
    }

    async fn create_variant(
        &self,
        variant: &NewServiceVariant,
    ) -> Result<ServiceVariant, DomainError> {
        let model = service_variants::ActiveModel {
            id: Set(Uuid::new_v4()),
            service_id: Set(variant.service_id.0),
            kind: Set(variant.kind.to_string()),
            name: Set(variant.name.clone()),
            price: Set(variant.price),
            is_active: Set(true),
            sort_order: Set(variant.sort_order),
        };

        let result = model.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn update_variant(
        &self,
        id: &VariantId,
        changes: &VariantChanges,
    ) -> Result<ServiceVariant, DomainError> {
        let mut model = service_variants::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Variant {} not found", id)))?
            .into_active_model();

        if let Some(name) = &changes.name {
            model.name = Set(name.clone());
        }
        if let Some(price) = changes.price {
            model.price = Set(price);
        }
        if let Some(is_active) = changes.is_active {
            model.is_active = Set(is_active);
        }
        if let Some(sort_order) = changes.sort_order {
            model.sort_order = Set(sort_order);
        }

        let result = model.update(&self.db).await?;
        Ok(result.into())
    }

    async fn delete_variant(&self, id: &VariantId) -> Result<(), DomainError> {
        service_variants::Entity::delete_by_id(id.0)
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

impl From<services::Model> for Service {
    fn from(model: services::Model) -> Self {
        Service {
            id: ServiceId(model.id),
            name: model.name,
            description: model.description,
            category: model.category,
            base_price: model.base_price,
            duration_minutes: model.duration_minutes,
            is_active: model.is_active,
            sort_order: model.sort_order,
            created_at: utc(model.created_at),
        }
    }
}

impl From<service_variants::Model> for ServiceVariant {
    fn from(model: service_variants::Model) -> Self {
        ServiceVariant {
            id: VariantId(model.id),
            service_id: ServiceId(model.service_id),
            kind: parse_or(&model.kind, VariantKind::Addon),
            name: model.name,
            price: model.price,
            is_active: model.is_active,
            sort_order: model.sort_order,
        }
    }
}
