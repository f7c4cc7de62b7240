//! PostgreSQL adapter for CartRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use sea_orm::sea_query::Expr;
use uuid::Uuid;

use super::{string_list, utc};
use crate::domain::entities::{
    ArtistId, BranchId, Cart, CartId, CartItem, CartItemId, CartOwner, NewCartItem, ServiceId,
    UserId, VariantSelection,
};
use crate::domain::ports::CartRepository;
use crate::entity::{cart_items, carts};
use crate::error::DomainError;

/// PostgreSQL implementation of CartRepository
pub struct PostgresCartRepository {
    db: DatabaseConnection,
}

impl PostgresCartRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn items(&self, cart_id: Uuid) -> Result<Vec<CartItem>, DomainError> {
        let results = cart_items::Entity::find()
            .filter(cart_items::Column::CartId.eq(cart_id))
            .order_by_asc(cart_items::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }
}

#[async_trait]
impl CartRepository for PostgresCartRepository {
    async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<Cart>, DomainError> {
        let query = match owner {
            CartOwner::Member(user_id) => {
                carts::Entity::find().filter(carts::Column::UserId.eq(user_id.0))
            }
            CartOwner::Guest(token) => {
                carts::Entity::find().filter(carts::Column::GuestToken.eq(token.as_str()))
            }
        };

        let Some(model) = query.one(&self.db).await? else {
            return Ok(None);
        };

        let items = self.items(model.id).await?;
        Ok(Some(cart_from_model(model, items)))
    }

    async fn create(
        &self,
        owner: &CartOwner,
        expires_at: DateTime<Utc>,
    ) -> Result<Cart, DomainError> {
        let now = Utc::now().fixed_offset();
        let (user_id, guest_token) = match owner {
            CartOwner::Member(user_id) => (Some(user_id.0), None),
            CartOwner::Guest(token) => (None, Some(token.clone())),
        };

        let model = carts::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            guest_token: Set(guest_token),
            branch_id: Set(None),
            artist_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            expires_at: Set(expires_at.fixed_offset()),
        };

        let result = model.insert(&self.db).await?;
        Ok(cart_from_model(result, vec![]))
    }

    async fn delete(&self, id: &CartId) -> Result<(), DomainError> {
        carts::Entity::delete_by_id(id.0).exec(&self.db).await?;
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = carts::Entity::delete_many()
            .filter(carts::Column::ExpiresAt.lte(now.fixed_offset()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn add_item(
        &self,
        cart_id: &CartId,
        item: &NewCartItem,
    ) -> Result<CartItem, DomainError> {
        let model = cart_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart_id.0),
            service_id: Set(item.service_id.0),
            selection: Set(serde_json::to_value(&item.selection)
                .map_err(|e| DomainError::Internal(e.to_string()))?),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            notes: Set(item.notes.clone()),
            reference_images: Set(serde_json::json!(item.reference_images)),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = model.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn save_item(&self, cart_id: &CartId, item: &CartItem) -> Result<(), DomainError> {
        let result = cart_items::Entity::update_many()
            .col_expr(
                cart_items::Column::Selection,
                Expr::value(
                    serde_json::to_value(&item.selection)
                        .map_err(|e| DomainError::Internal(e.to_string()))?,
                ),
            )
            .col_expr(cart_items::Column::Quantity, Expr::value(item.quantity))
            .col_expr(cart_items::Column::UnitPrice, Expr::value(item.unit_price))
            .col_expr(cart_items::Column::Notes, Expr::value(item.notes.clone()))
            .filter(cart_items::Column::Id.eq(item.id.0))
            .filter(cart_items::Column::CartId.eq(cart_id.0))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound(format!(
                "Cart item {} not found",
                item.id
            )));
        }
        Ok(())
    }

    async fn remove_item(
        &self,
        cart_id: &CartId,
        item_id: &CartItemId,
    ) -> Result<bool, DomainError> {
        let result = cart_items::Entity::delete_many()
            .filter(cart_items::Column::Id.eq(item_id.0))
            .filter(cart_items::Column::CartId.eq(cart_id.0))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn clear(&self, cart_id: &CartId) -> Result<(), DomainError> {
        cart_items::Entity::delete_many()
            .filter(cart_items::Column::CartId.eq(cart_id.0))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn set_preferences(
        &self,
        cart_id: &CartId,
        branch_id: Option<BranchId>,
        artist_id: Option<ArtistId>,
    ) -> Result<(), DomainError> {
        carts::ActiveModel {
            id: Set(cart_id.0),
            branch_id: Set(branch_id.map(|b| b.0)),
            artist_id: Set(artist_id.map(|a| a.0)),
            ..Default::default()
        }
        .update(&self.db)
        .await?;

        Ok(())
    }

    async fn touch(
        &self,
        cart_id: &CartId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        carts::ActiveModel {
            id: Set(cart_id.0),
            updated_at: Set(now.fixed_offset()),
            expires_at: Set(expires_at.fixed_offset()),
            ..Default::default()
        }
        .update(&self.db)
        .await?;

        Ok(())
    }

    async fn move_items(&self, from: &CartId, to: &CartId) -> Result<(), DomainError> {
        cart_items::Entity::update_many()
            .col_expr(cart_items::Column::CartId, Expr::value(to.0))
            .filter(cart_items::Column::CartId.eq(from.0))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

fn cart_from_model(model: carts::Model, items: Vec<CartItem>) -> Cart {
    let owner = match (model.user_id, model.guest_token) {
        (Some(user_id), _) => CartOwner::Member(UserId(user_id)),
        (None, Some(token)) => CartOwner::Guest(token),
        (None, None) => CartOwner::Guest(String::new()),
    };

    Cart {
        id: CartId(model.id),
        owner,
        branch_id: model.branch_id.map(BranchId),
        artist_id: model.artist_id.map(ArtistId),
        items,
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
        expires_at: utc(model.expires_at),
    }
}

impl From<cart_items::Model> for CartItem {
    fn from(model: cart_items::Model) -> Self {
        CartItem {
            id: CartItemId(model.id),
            service_id: ServiceId(model.service_id),
            selection: serde_json::from_value::<VariantSelection>(model.selection)
                .unwrap_or_default(),
            quantity: model.quantity,
            unit_price: model.unit_price,
            notes: model.notes,
            reference_images: string_list(model.reference_images),
            created_at: utc(model.created_at),
        }
    }
}
