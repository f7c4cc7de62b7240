//! Audit trail service

use std::sync::Arc;

use serde::Serialize;

use crate::domain::entities::{AuditLog, AuditLogQuery, NewAuditLog, User, UserId};
use crate::domain::ports::AuditLogRepository;
use crate::error::AppError;

const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 500;

pub struct AuditService<AL>
where
    AL: AuditLogRepository,
{
    logs: Arc<AL>,
}

impl<AL> AuditService<AL>
where
    AL: AuditLogRepository,
{
    pub fn new(logs: Arc<AL>) -> Self {
        Self { logs }
    }

    /// Record an action; failures are logged and swallowed
    pub async fn record<D: Serialize>(
        &self,
        actor: Option<&UserId>,
        action: &str,
        entity_type: &str,
        entity_id: Option<String>,
        details: D,
    ) {
        let details = serde_json::to_value(details).unwrap_or(serde_json::Value::Null);
        let entry = NewAuditLog {
            actor_id: actor.copied(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details,
        };

        if let Err(e) = self.logs.create(&entry).await {
            tracing::warn!(error = %e, action, entity_type, "Failed to write audit log");
        }
    }

    /// Shorthand for actions taken by a signed-in user
    pub async fn record_by<D: Serialize>(
        &self,
        actor: &User,
        action: &str,
        entity_type: &str,
        entity_id: impl ToString,
        details: D,
    ) {
        self.record(
            Some(&actor.id),
            action,
            entity_type,
            Some(entity_id.to_string()),
            details,
        )
        .await
    }

    pub async fn list(&self, mut query: AuditLogQuery) -> Result<Vec<AuditLog>, AppError> {
        query.limit = match query.limit {
            0 => DEFAULT_LIMIT,
            n => n.min(MAX_LIMIT),
        };
        Ok(self.logs.list(&query).await?)
    }
}
