//! PostgreSQL adapter for AuditLogRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use super::utc;
use crate::domain::entities::{AuditLog, AuditLogId, AuditLogQuery, NewAuditLog, UserId};
use crate::domain::ports::AuditLogRepository;
use crate::entity::audit_logs;
use crate::error::DomainError;

/// PostgreSQL implementation of AuditLogRepository
pub struct PostgresAuditLogRepository {
    db: DatabaseConnection,
}

impl PostgresAuditLogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn create(&self, entry: &NewAuditLog) -> Result<AuditLog, DomainError> {
        let model = audit_logs::ActiveModel {
            id: Set(Uuid::new_v4()),
            actor_id: Set(entry.actor_id.map(|a| a.0)),
            action: Set(entry.action.clone()),
            entity_type: Set(entry.entity_type.clone()),
            entity_id: Set(entry.entity_id.clone()),
            details: Set(entry.details.clone()),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = model.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn list(&self, query: &AuditLogQuery) -> Result<Vec<AuditLog>, DomainError> {
        let mut select = audit_logs::Entity::find()
            .order_by_desc(audit_logs::Column::CreatedAt)
            .limit(query.limit)
            .offset(query.offset);

        if let Some(actor_id) = query.actor_id {
            select = select.filter(audit_logs::Column::ActorId.eq(actor_id.0));
        }
        if let Some(entity_type) = &query.entity_type {
            select = select.filter(audit_logs::Column::EntityType.eq(entity_type.as_str()));
        }
        if let Some(action) = &query.action {
            select = select.filter(audit_logs::Column::Action.eq(action.as_str()));
        }
        if let Some(from) = query.from {
            select = select.filter(audit_logs::Column::CreatedAt.gte(from.fixed_offset()));
        }
        if let Some(to) = query.to {
            select = select.filter(audit_logs::Column::CreatedAt.lt(to.fixed_offset()));
        }

        let results = select.all(&self.db).await?;
        Ok(results.into_iter().map(|m| m.into()).collect())
    }
}

impl From<audit_logs::Model> for AuditLog {
    fn from(model: audit_logs::Model) -> Self {
        AuditLog {
            id: AuditLogId(model.id),
            actor_id: model.actor_id.map(UserId),
            action: model.action,
            entity_type: model.entity_type,
            entity_id: model.entity_id,
            details: model.details,
            created_at: utc(model.created_at),
        }
    }
}
