//! Contact (lead) domain entity
//!
//! Submissions of the public contact form, worked by studio staff.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::artist::ArtistId;
use super::branch::BranchId;
use super::macros::{entity_id, string_enum};

entity_id!(
    /// Unique identifier for a contact request
    ContactId
);

string_enum!(
    /// Follow-up state of a contact request
    ContactStatus {
        New => "new",
        Contacted => "contacted",
        Converted => "converted",
        Closed => "closed",
    }
);

impl ContactStatus {
    pub fn can_transition_to(&self, next: ContactStatus) -> bool {
        use ContactStatus::*;
        matches!(
            (self, next),
            (New, Contacted) | (New, Closed) | (Contacted, Converted) | (Contacted, Closed)
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub message: String,
    pub branch_id: Option<BranchId>,
    pub artist_id: Option<ArtistId>,
    pub status: ContactStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub message: String,
    pub branch_id: Option<BranchId>,
    pub artist_id: Option<ArtistId>,
}
