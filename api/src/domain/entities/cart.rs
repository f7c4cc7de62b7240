//! Cart domain entity
//!
//! Carts hold the configurator selections of a guest or member before
//! checkout turns them into an appointment.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::artist::ArtistId;
use super::branch::BranchId;
use super::macros::entity_id;
use super::service::{ServiceId, VariantId};
use super::user::UserId;

entity_id!(
    /// Unique identifier for a cart
    CartId
);

entity_id!(
    /// Unique identifier for a cart line
    CartItemId
);

/// Days of inactivity after which a cart is discarded
pub const CART_TTL_DAYS: i64 = 7;

/// Who a cart belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    Member(UserId),
    Guest(String),
}

/// Variant picks for one configured service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSelection {
    #[serde(default)]
    pub size_id: Option<VariantId>,
    #[serde(default)]
    pub color_id: Option<VariantId>,
    #[serde(default)]
    pub position_id: Option<VariantId>,
    #[serde(default)]
    pub design_fee: bool,
    #[serde(default)]
    pub addon_ids: Vec<VariantId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub owner: CartOwner,
    pub branch_id: Option<BranchId>,
    pub artist_id: Option<ArtistId>,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Cart {
    /// An empty cart that has not been stored yet
    pub fn empty(owner: CartOwner, now: DateTime<Utc>) -> Self {
        Self {
            id: CartId::new(),
            owner,
            branch_id: None,
            artist_id: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
            expires_at: Self::expiry_from(now),
        }
    }

    /// Expiry for a cart touched at `now`
    pub fn expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(CART_TTL_DAYS)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Sum of all line totals
    pub fn total(&self) -> i64 {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One configured service in a cart
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub service_id: ServiceId,
    pub selection: VariantSelection,
    pub quantity: i32,
    /// Unit price computed when the item was added or last changed
    pub unit_price: i64,
    pub notes: Option<String>,
    pub reference_images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone)]
pub struct NewCartItem {
    pub service_id: ServiceId,
    pub selection: VariantSelection,
    pub quantity: i32,
    pub unit_price: i64,
    pub notes: Option<String>,
    pub reference_images: Vec<String>,
}
