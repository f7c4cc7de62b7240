//! Cart service
//!
//! Carts belong to a member or to a guest token. A cart row is only stored
//! once something is put in it. Every mutation prices the selection and
//! pushes the expiry forward; expired carts are swept periodically and
//! replaced on the next mutation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::pricing::{calculate_price, PriceBreakdown};
use crate::app::serde_helpers::double_option;
use crate::app::validation::optional_text;
use crate::domain::entities::{
    ArtistId, BranchId, Cart, CartId, CartItem, CartItemId, CartOwner, NewCartItem, Service,
    ServiceId, ServiceVariant, UserId, VariantSelection,
};
use crate::domain::ports::{ArtistRepository, BranchRepository, CartRepository, ServiceRepository};
use crate::error::{AppError, DomainError};

const GUEST_TOKEN_BYTES: usize = 32;
const MAX_REFERENCE_IMAGES: usize = 10;

/// Generate a fresh guest cart token
pub fn generate_guest_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..GUEST_TOKEN_BYTES).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}

/// Whether a client-supplied guest token has the shape we issue
pub fn is_valid_guest_token(token: &str) -> bool {
    token.len() == GUEST_TOKEN_BYTES * 2 && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// A cart with its total
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub total: i64,
    pub item_count: i32,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        let total = cart.total();
        let item_count = cart.items.iter().map(|i| i.quantity).sum();
        Self {
            cart,
            total,
            item_count,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddItem {
    pub service_id: ServiceId,
    #[serde(default)]
    pub selection: VariantSelection,
    #[serde(default = "one")]
    pub quantity: i32,
    pub notes: Option<String>,
    #[serde(default)]
    pub reference_images: Vec<String>,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemUpdate {
    pub selection: Option<VariantSelection>,
    pub quantity: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    pub reference_images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartPreferences {
    #[serde(default, deserialize_with = "double_option")]
    pub branch_id: Option<Option<BranchId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub artist_id: Option<Option<ArtistId>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub branch_id: Option<BranchId>,
    pub artist_id: Option<ArtistId>,
    pub start_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Everything needed to book an appointment from a cart
#[derive(Debug, Clone)]
pub struct CheckoutDraft {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub branch_id: BranchId,
    pub artist_id: ArtistId,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub total: i64,
    pub snapshot: serde_json::Value,
    pub notes: Option<String>,
}

pub struct CartService<CR, SR, BR, AR>
where
    CR: CartRepository,
    SR: ServiceRepository,
    BR: BranchRepository,
    AR: ArtistRepository,
{
    carts: Arc<CR>,
    services: Arc<SR>,
    branches: Arc<BR>,
    artists: Arc<AR>,
}

impl<CR, SR, BR, AR> CartService<CR, SR, BR, AR>
where
    CR: CartRepository,
    SR: ServiceRepository,
    BR: BranchRepository,
    AR: ArtistRepository,
{
    pub fn new(carts: Arc<CR>, services: Arc<SR>, branches: Arc<BR>, artists: Arc<AR>) -> Self {
        Self {
            carts,
            services,
            branches,
            artists,
        }
    }

    /// The owner's cart if it exists and has not expired
    async fn live(&self, owner: &CartOwner, now: DateTime<Utc>) -> Result<Option<Cart>, AppError> {
        Ok(self
            .carts
            .find_by_owner(owner)
            .await?
            .filter(|cart| !cart.is_expired(now)))
    }

    /// The owner's live cart, replacing an expired one and creating it when missing
    async fn current(&self, owner: &CartOwner, now: DateTime<Utc>) -> Result<Cart, AppError> {
        if let Some(cart) = self.carts.find_by_owner(owner).await? {
            if !cart.is_expired(now) {
                return Ok(cart);
            }
            tracing::debug!(cart_id = %cart.id, "Replacing expired cart");
            self.carts.delete(&cart.id).await?;
        }
        Ok(self.carts.create(owner, Cart::expiry_from(now)).await?)
    }

    async fn touch(&self, cart_id: &CartId) -> Result<(), AppError> {
        let now = Utc::now();
        self.carts.touch(cart_id, now, Cart::expiry_from(now)).await?;
        Ok(())
    }

    async fn reload(&self, owner: &CartOwner) -> Result<CartView, AppError> {
        let cart = self
            .carts
            .find_by_owner(owner)
            .await?
            .ok_or_else(|| DomainError::NotFound("Cart not found".to_string()))?;
        Ok(cart.into())
    }

    async fn active_service(
        &self,
        service_id: &ServiceId,
    ) -> Result<(Service, Vec<ServiceVariant>), AppError> {
        let service = match self.services.find_by_id(service_id).await? {
            Some(service) if service.is_active => service,
            _ => {
                return Err(
                    DomainError::NotFound(format!("Service {} not found", service_id)).into(),
                )
            }
        };
        let variants = self.services.variants_for(service_id).await?;
        Ok((service, variants))
    }

    async fn price(
        &self,
        service_id: &ServiceId,
        selection: &VariantSelection,
        quantity: i32,
    ) -> Result<(Service, PriceBreakdown), AppError> {
        let (service, variants) = self.active_service(service_id).await?;
        let breakdown = calculate_price(&service, &variants, selection, quantity)?;
        Ok((service, breakdown))
    }

    /// The owner's cart, or an unsaved empty one
    pub async fn view(&self, owner: &CartOwner) -> Result<CartView, AppError> {
        let now = Utc::now();
        let cart = self
            .live(owner, now)
            .await?
            .unwrap_or_else(|| Cart::empty(owner.clone(), now));
        Ok(cart.into())
    }

    /// Delete carts past their expiry
    pub async fn sweep_expired(&self) -> Result<u64, AppError> {
        let removed = self.carts.delete_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(removed, "Swept expired carts");
        }
        Ok(removed)
    }

    pub async fn add_item(&self, owner: &CartOwner, item: AddItem) -> Result<CartView, AppError> {
        if item.reference_images.len() > MAX_REFERENCE_IMAGES {
            return Err(AppError::BadRequest(format!(
                "At most {} reference images per item",
                MAX_REFERENCE_IMAGES
            )));
        }
        let (_, breakdown) = self
            .price(&item.service_id, &item.selection, item.quantity)
            .await?;
        let cart = self.current(owner, Utc::now()).await?;

        self.carts
            .add_item(
                &cart.id,
                &NewCartItem {
                    service_id: item.service_id,
                    selection: item.selection,
                    quantity: item.quantity,
                    unit_price: breakdown.unit_price,
                    notes: optional_text(item.notes.as_deref()),
                    reference_images: item.reference_images,
                },
            )
            .await?;
        self.touch(&cart.id).await?;

        self.reload(owner).await
    }

    /// Change an item, re-pricing when the selection or quantity changes
    pub async fn update_item(
        &self,
        owner: &CartOwner,
        item_id: &CartItemId,
        update: ItemUpdate,
    ) -> Result<CartView, AppError> {
        let missing = || DomainError::NotFound(format!("Cart item {} not found", item_id));
        let cart = self.live(owner, Utc::now()).await?.ok_or_else(missing)?;
        let mut item: CartItem = cart
            .items
            .iter()
            .find(|i| i.id == *item_id)
            .cloned()
            .ok_or_else(missing)?;

        if update.selection.is_some() || update.quantity.is_some() {
            let selection = update.selection.unwrap_or_else(|| item.selection.clone());
            let quantity = update.quantity.unwrap_or(item.quantity);
            let (_, breakdown) = self.price(&item.service_id, &selection, quantity).await?;
            item.selection = selection;
            item.quantity = quantity;
            item.unit_price = breakdown.unit_price;
        }
        if let Some(notes) = update.notes {
            item.notes = optional_text(notes.as_deref());
        }
        if let Some(images) = update.reference_images {
            if images.len() > MAX_REFERENCE_IMAGES {
                return Err(AppError::BadRequest(format!(
                    "At most {} reference images per item",
                    MAX_REFERENCE_IMAGES
                )));
            }
            item.reference_images = images;
        }

        self.carts.save_item(&cart.id, &item).await?;
        self.touch(&cart.id).await?;
        self.reload(owner).await
    }

    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        item_id: &CartItemId,
    ) -> Result<CartView, AppError> {
        let missing = || DomainError::NotFound(format!("Cart item {} not found", item_id));
        let cart = self.live(owner, Utc::now()).await?.ok_or_else(missing)?;
        if !self.carts.remove_item(&cart.id, item_id).await? {
            return Err(missing().into());
        }
        self.touch(&cart.id).await?;
        self.reload(owner).await
    }

    pub async fn clear(&self, owner: &CartOwner) -> Result<CartView, AppError> {
        let Some(cart) = self.live(owner, Utc::now()).await? else {
            return self.view(owner).await;
        };
        self.carts.clear(&cart.id).await?;
        self.touch(&cart.id).await?;
        self.reload(owner).await
    }

    /// Preferred branch and artist for checkout
    pub async fn set_preferences(
        &self,
        owner: &CartOwner,
        prefs: CartPreferences,
    ) -> Result<CartView, AppError> {
        let cart = self.current(owner, Utc::now()).await?;

        let branch_id = match prefs.branch_id {
            Some(Some(id)) => {
                self.active_branch(&id).await?;
                Some(id)
            }
            Some(None) => None,
            None => cart.branch_id,
        };
        let artist_id = match prefs.artist_id {
            Some(Some(id)) => {
                self.active_artist(&id).await?;
                Some(id)
            }
            Some(None) => None,
            None => cart.artist_id,
        };

        self.carts
            .set_preferences(&cart.id, branch_id, artist_id)
            .await?;
        self.touch(&cart.id).await?;
        self.reload(owner).await
    }

    /// Move a guest cart's items into the member's cart and drop the guest cart
    pub async fn merge_guest(&self, guest_token: &str, user_id: UserId) -> Result<(), AppError> {
        let guest_owner = CartOwner::Guest(guest_token.to_string());
        let Some(guest) = self.carts.find_by_owner(&guest_owner).await? else {
            return Ok(());
        };

        let now = Utc::now();
        if guest.is_expired(now) || guest.is_empty() {
            self.carts.delete(&guest.id).await?;
            return Ok(());
        }

        let member_cart = self.current(&CartOwner::Member(user_id), now).await?;
        self.carts.move_items(&guest.id, &member_cart.id).await?;

        if member_cart.branch_id.is_none() && member_cart.artist_id.is_none() {
            self.carts
                .set_preferences(&member_cart.id, guest.branch_id, guest.artist_id)
                .await?;
        }
        self.carts.delete(&guest.id).await?;
        self.touch(&member_cart.id).await?;

        tracing::info!(
            user_id = %user_id,
            items = guest.items.len(),
            "Merged guest cart into member cart"
        );
        Ok(())
    }

    /// Validate the cart for checkout and build the appointment snapshot
    pub async fn checkout_draft(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> Result<CheckoutDraft, AppError> {
        let owner = CartOwner::Member(user_id);
        let cart = match self.live(&owner, Utc::now()).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(AppError::BadRequest("Cart is empty".to_string())),
        };

        let branch_id = request
            .branch_id
            .or(cart.branch_id)
            .ok_or_else(|| AppError::BadRequest("A branch is required".to_string()))?;
        let artist_id = request
            .artist_id
            .or(cart.artist_id)
            .ok_or_else(|| AppError::BadRequest("An artist is required".to_string()))?;

        let mut minutes: i64 = 0;
        let mut total: i64 = 0;
        let mut lines = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let (service, breakdown) = self
                .price(&item.service_id, &item.selection, item.quantity)
                .await?;
            minutes += i64::from(service.duration_minutes) * i64::from(item.quantity);
            total += breakdown.total;
            lines.push(json!({
                "item_id": item.id,
                "service_id": service.id,
                "service_name": service.name,
                "selection": item.selection,
                "quantity": item.quantity,
                "unit_price": breakdown.unit_price,
                "line_total": breakdown.total,
                "breakdown": breakdown,
                "notes": item.notes,
                "reference_images": item.reference_images,
            }));
        }

        Ok(CheckoutDraft {
            cart_id: cart.id,
            user_id,
            branch_id,
            artist_id,
            start_at: request.start_at,
            end_at: request.start_at + Duration::minutes(minutes),
            total,
            snapshot: json!({
                "cart_id": cart.id,
                "items": lines,
                "total": total,
                "duration_minutes": minutes,
            }),
            notes: optional_text(request.notes.as_deref()),
        })
    }

    /// Empty the cart once its appointment exists
    pub async fn complete_checkout(&self, draft: &CheckoutDraft) -> Result<(), AppError> {
        self.carts.clear(&draft.cart_id).await?;
        self.touch(&draft.cart_id).await?;
        tracing::info!(cart_id = %draft.cart_id, user_id = %draft.user_id, "Cart checked out");
        Ok(())
    }

    async fn active_branch(&self, id: &BranchId) -> Result<(), AppError> {
        match self.branches.find_by_id(id).await? {
            Some(branch) if branch.is_active => Ok(()),
            _ => Err(DomainError::NotFound(format!("Branch {} not found", id)).into()),
        }
    }

    async fn active_artist(&self, id: &ArtistId) -> Result<(), AppError> {
        match self.artists.find_by_id(id).await? {
            Some(artist) if artist.is_active => Ok(()),
            _ => Err(DomainError::NotFound(format!("Artist {} not found", id)).into()),
        }
    }
}
