//! Member domain entity
//!
//! A member is the customer-facing profile attached to a `member` user. It
//! carries the loyalty balance and membership level.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::macros::{entity_id, string_enum};
use super::user::UserId;

entity_id!(
    /// Unique identifier for a member profile
    MemberId
);

string_enum!(
    /// Membership level derived from lifetime spend
    MembershipLevel {
        Standard => "standard",
        Silver => "silver",
        Gold => "gold",
        Platinum => "platinum",
    }
);

/// Lifetime spend needed for silver
pub const SILVER_THRESHOLD: i64 = 20_000;
/// Lifetime spend needed for gold
pub const GOLD_THRESHOLD: i64 = 50_000;
/// Lifetime spend needed for platinum
pub const PLATINUM_THRESHOLD: i64 = 100_000;
/// Currency units paid per loyalty point earned
pub const AMOUNT_PER_POINT: i64 = 100;

impl MembershipLevel {
    /// Level reached with the given lifetime spend
    pub fn from_total_spent(total_spent: i64) -> Self {
        match total_spent {
            t if t >= PLATINUM_THRESHOLD => MembershipLevel::Platinum,
            t if t >= GOLD_THRESHOLD => MembershipLevel::Gold,
            t if t >= SILVER_THRESHOLD => MembershipLevel::Silver,
            _ => MembershipLevel::Standard,
        }
    }

    /// Bill discount granted at this level, in percent
    pub fn discount_percent(&self) -> i64 {
        match self {
            MembershipLevel::Standard => 0,
            MembershipLevel::Silver => 5,
            MembershipLevel::Gold => 8,
            MembershipLevel::Platinum => 10,
        }
    }

    /// Discount on a subtotal, rounded down
    pub fn discount_for(&self, subtotal: i64) -> i64 {
        subtotal * self.discount_percent() / 100
    }
}

/// Points earned for a payment amount
pub fn points_for_payment(amount: i64) -> i64 {
    if amount <= 0 {
        0
    } else {
        amount / AMOUNT_PER_POINT
    }
}

/// A customer profile
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id: MemberId,
    pub user_id: UserId,
    pub name: String,
    pub phone: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub level: MembershipLevel,
    pub points: i64,
    pub total_spent: i64,
    /// Staff-only remarks
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub user_id: UserId,
    pub name: String,
    pub phone: Option<String>,
    pub birthday: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct MemberChanges {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub birthday: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
}

/// Search filter for the staff member list
#[derive(Debug, Clone, Default)]
pub struct MemberQuery {
    /// Matches name, phone or account email, case-insensitive
    pub search: Option<String>,
    pub limit: u64,
    pub offset: u64,
}
