//! Price calculator
//!
//! Turns a service, its variants and a configurator selection into a price
//! breakdown. Pure and synchronous; callers load the variants.

use serde::{Deserialize, Serialize};

use crate::domain::entities::{Service, ServiceVariant, VariantId, VariantKind, VariantSelection};
use crate::error::DomainError;

pub const MIN_QUANTITY: i32 = 1;
pub const MAX_QUANTITY: i32 = 20;

/// A selection plus how many times it is ordered
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceRequest {
    #[serde(flatten)]
    pub selection: VariantSelection,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// Every component that went into a price
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    /// Size variant price, or the service base price when no size was picked
    pub base: i64,
    pub color: i64,
    pub position: i64,
    pub design_fee: i64,
    pub addons: i64,
    pub unit_price: i64,
    pub quantity: i32,
    pub total: i64,
}

fn lookup<'a>(
    variants: &'a [ServiceVariant],
    service: &Service,
    id: &VariantId,
    kind: VariantKind,
) -> Result<&'a ServiceVariant, DomainError> {
    let variant = variants
        .iter()
        .find(|v| v.id == *id && v.service_id == service.id)
        .ok_or_else(|| {
            DomainError::Validation(format!("Variant {} does not belong to this service", id))
        })?;

    if !variant.is_active {
        return Err(DomainError::Validation(format!(
            "Variant '{}' is not available",
            variant.name
        )));
    }
    if variant.kind != kind {
        return Err(DomainError::Validation(format!(
            "Variant '{}' is a {} option, not {}",
            variant.name, variant.kind, kind
        )));
    }
    Ok(variant)
}

fn optional_price(
    variants: &[ServiceVariant],
    service: &Service,
    id: Option<&VariantId>,
    kind: VariantKind,
) -> Result<i64, DomainError> {
    match id {
        Some(id) => Ok(lookup(variants, service, id, kind)?.price),
        None => Ok(0),
    }
}

/// Price one configured service
pub fn calculate_price(
    service: &Service,
    variants: &[ServiceVariant],
    selection: &VariantSelection,
    quantity: i32,
) -> Result<PriceBreakdown, DomainError> {
    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        return Err(DomainError::Validation(format!(
            "Quantity must be between {} and {}",
            MIN_QUANTITY, MAX_QUANTITY
        )));
    }

    let has_sizes = variants
        .iter()
        .any(|v| v.service_id == service.id && v.is_active && v.kind == VariantKind::Size);

    let base = match &selection.size_id {
        Some(id) => lookup(variants, service, id, VariantKind::Size)?.price,
        None if has_sizes => {
            return Err(DomainError::Validation(format!(
                "A size is required for '{}'",
                service.name
            )))
        }
        None => service.base_price,
    };

    let color = optional_price(variants, service, selection.color_id.as_ref(), VariantKind::Color)?;
    let position = optional_price(
        variants,
        service,
        selection.position_id.as_ref(),
        VariantKind::Position,
    )?;

    let design_fee = if selection.design_fee {
        variants
            .iter()
            .filter(|v| {
                v.service_id == service.id && v.is_active && v.kind == VariantKind::DesignFee
            })
            .map(|v| v.price)
            .sum()
    } else {
        0
    };

    let mut addons = 0;
    for id in &selection.addon_ids {
        addons += lookup(variants, service, id, VariantKind::Addon)?.price;
    }

    let unit_price = base + color + position + design_fee + addons;

    Ok(PriceBreakdown {
        base,
        color,
        position,
        design_fee,
        addons,
        unit_price,
        quantity,
        total: unit_price * i64::from(quantity),
    })
}
