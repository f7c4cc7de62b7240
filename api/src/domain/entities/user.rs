//! User domain entity
//!
//! Every person who signs in: studio staff (boss, managers, artists) and members.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::branch::BranchId;
use super::macros::{entity_id, string_enum};

entity_id!(
    /// Unique identifier for a user
    UserId
);

string_enum!(
    /// Access role of a user
    Role {
        Boss => "boss",
        Manager => "manager",
        Artist => "artist",
        Member => "member",
    }
);

impl Role {
    /// Staff roles can see studio data beyond their own records
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Boss | Role::Manager | Role::Artist)
    }

    /// Admin roles can manage branch resources
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Boss | Role::Manager)
    }
}

/// A user account
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    /// Home branch for managers and artists
    pub branch_id: Option<BranchId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Whether this user may administer the given branch
    pub fn can_manage_branch(&self, branch_id: &BranchId) -> bool {
        match self.role {
            Role::Boss => true,
            Role::Manager => self.branch_id.as_ref() == Some(branch_id),
            _ => false,
        }
    }
}

/// Data needed to create a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub branch_id: Option<BranchId>,
}

/// Partial update of a user account
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub role: Option<Role>,
    pub branch_id: Option<Option<BranchId>>,
    pub is_active: Option<bool>,
}
