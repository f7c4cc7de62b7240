//! Audit log domain entity
//!
//! Append-only record of privileged actions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::macros::entity_id;
use super::user::UserId;

entity_id!(
    /// Unique identifier for an audit record
    AuditLogId
);

#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    /// `None` for system-initiated actions
    pub actor_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub actor_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct AuditLogQuery {
    pub actor_id: Option<UserId>,
    pub entity_type: Option<String>,
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: u64,
    pub offset: u64,
}
