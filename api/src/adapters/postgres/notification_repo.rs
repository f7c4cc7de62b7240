//! PostgreSQL adapter for NotificationRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::{parse_or, utc};
use crate::domain::entities::{
    NewNotification, Notification, NotificationId, NotificationKind, UserId,
};
use crate::domain::ports::NotificationRepository;
use crate::entity::notifications;
use crate::error::DomainError;

/// PostgreSQL implementation of NotificationRepository
pub struct PostgresNotificationRepository {
    db: DatabaseConnection,
}

impl PostgresNotificationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification, DomainError> {
        let model = notifications::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(notification.user_id.0),
            kind: Set(notification.kind.to_string()),
            title: Set(notification.title.clone()),
            body: Set(notification.body.clone()),
            link: Set(notification.link.clone()),
            is_read: Set(false),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = model.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        unread_only: bool,
        limit: u64,
    ) -> Result<Vec<Notification>, DomainError> {
        let mut select = notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id.0))
            .order_by_desc(notifications::Column::CreatedAt)
            .limit(limit);
        if unread_only {
            select = select.filter(notifications::Column::IsRead.eq(false));
        }

        let results = select.all(&self.db).await?;
        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn count_unread(&self, user_id: &UserId) -> Result<u64, DomainError> {
        let count = notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id.0))
            .filter(notifications::Column::IsRead.eq(false))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn mark_read(&self, user_id: &UserId, id: &NotificationId) -> Result<bool, DomainError> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .filter(notifications::Column::Id.eq(id.0))
            .filter(notifications::Column::UserId.eq(user_id.0))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, DomainError> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .filter(notifications::Column::UserId.eq(user_id.0))
            .filter(notifications::Column::IsRead.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

impl From<notifications::Model> for Notification {
    fn from(model: notifications::Model) -> Self {
        Notification {
            id: NotificationId(model.id),
            user_id: UserId(model.user_id),
            kind: parse_or(&model.kind, NotificationKind::System),
            title: model.title,
            body: model.body,
            link: model.link,
            is_read: model.is_read,
            created_at: utc(model.created_at),
        }
    }
}
