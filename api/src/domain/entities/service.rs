//! Service catalog entities
//!
//! A service is something the studio sells (a tattoo style, a cover-up, a
//! touch-up session). Variants are the options a customer picks in the cart
//! configurator; their prices feed the pricing calculator.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::macros::{entity_id, string_enum};

entity_id!(
    /// Unique identifier for a catalog service
    ServiceId
);

entity_id!(
    /// Unique identifier for a service variant
    VariantId
);

string_enum!(
    /// Which configurator slot a variant fills
    VariantKind {
        Size => "size",
        Color => "color",
        Position => "position",
        DesignFee => "design_fee",
        Addon => "addon",
    }
);

/// A bookable service
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub base_price: i64,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// One priced option of a service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceVariant {
    pub id: VariantId,
    pub service_id: ServiceId,
    pub kind: VariantKind,
    pub name: String,
    /// Absolute price for sizes, surcharge for every other kind
    pub price: i64,
    pub is_active: bool,
    pub sort_order: i32,
}

/// A service together with its variants
#[derive(Debug, Clone, Serialize)]
pub struct ServiceWithVariants {
    #[serde(flatten)]
    pub service: Service,
    pub variants: Vec<ServiceVariant>,
}

#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub base_price: i64,
    pub duration_minutes: i32,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub base_price: Option<i64>,
    pub duration_minutes: Option<i32>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewServiceVariant {
    pub service_id: ServiceId,
    pub kind: VariantKind,
    pub name: String,
    pub price: i64,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct VariantChanges {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}
