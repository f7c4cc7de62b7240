//! Branch domain entity

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::macros::entity_id;

entity_id!(
    /// Unique identifier for a studio branch
    BranchId
);

/// A physical studio location
#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub business_hours: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBranch {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub business_hours: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BranchChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<Option<String>>,
    pub business_hours: Option<Option<String>>,
    pub is_active: Option<bool>,
}
