//! Notification service
//!
//! In-app notifications. Delivery is best effort: a failed insert is logged
//! and never fails the operation that triggered it.

use std::sync::Arc;

use crate::domain::entities::{
    NewNotification, Notification, NotificationId, NotificationKind, UserId,
};
use crate::domain::ports::NotificationRepository;
use crate::error::{AppError, DomainError};

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 200;

pub struct NotificationService<NR>
where
    NR: NotificationRepository,
{
    notifications: Arc<NR>,
}

impl<NR> NotificationService<NR>
where
    NR: NotificationRepository,
{
    pub fn new(notifications: Arc<NR>) -> Self {
        Self { notifications }
    }

    /// Send a notification, logging instead of failing
    pub async fn notify(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        link: Option<String>,
    ) {
        let notification = NewNotification {
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            link,
        };

        if let Err(e) = self.notifications.create(&notification).await {
            tracing::warn!(
                error = %e,
                user_id = %user_id,
                kind = %kind,
                "Failed to deliver notification"
            );
        }
    }

    pub async fn list(
        &self,
        user_id: &UserId,
        unread_only: bool,
        limit: Option<u64>,
    ) -> Result<Vec<Notification>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        Ok(self
            .notifications
            .list_for_user(user_id, unread_only, limit)
            .await?)
    }

    pub async fn unread_count(&self, user_id: &UserId) -> Result<u64, AppError> {
        Ok(self.notifications.count_unread(user_id).await?)
    }

    pub async fn mark_read(&self, user_id: &UserId, id: &NotificationId) -> Result<(), AppError> {
        if self.notifications.mark_read(user_id, id).await? {
            Ok(())
        } else {
            Err(DomainError::NotFound(format!("Notification {} not found", id)).into())
        }
    }

    pub async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, AppError> {
        Ok(self.notifications.mark_all_read(user_id).await?)
    }
}
