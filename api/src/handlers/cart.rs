//! Cart handlers
//!
//! Signed-in callers use their member cart. Everyone else is identified by
//! the `X-Cart-Token` header; a fresh token is returned in that header when
//! the request carried none.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::{
    generate_guest_token, is_valid_guest_token, AddItem, CartPreferences, CartView,
    CheckoutRequest, ItemUpdate,
};
use crate::domain::entities::{Appointment, CartItemId, CartOwner, Role, User};
use crate::error::AppError;
use crate::AppState;

pub const CART_TOKEN_HEADER: &str = "x-cart-token";

/// The well-formed guest token carried by a request, if any
pub fn guest_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CART_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| is_valid_guest_token(t))
        .map(str::to_string)
}

/// Cart owner of a request plus a token to hand back when one was minted
struct Caller {
    owner: CartOwner,
    issued: Option<String>,
}

impl Caller {
    fn resolve(user: Option<Extension<User>>, headers: &HeaderMap) -> Result<Self, AppError> {
        if let Some(Extension(user)) = user {
            return Ok(Self {
                owner: CartOwner::Member(user.id),
                issued: None,
            });
        }

        match headers.get(CART_TOKEN_HEADER) {
            None => {
                let token = generate_guest_token();
                Ok(Self {
                    owner: CartOwner::Guest(token.clone()),
                    issued: Some(token),
                })
            }
            Some(_) => {
                let token = guest_token(headers)
                    .ok_or_else(|| AppError::BadRequest("Malformed cart token".to_string()))?;
                Ok(Self {
                    owner: CartOwner::Guest(token),
                    issued: None,
                })
            }
        }
    }

    fn respond(self, view: CartView) -> Response {
        let mut response = Json(view).into_response();
        if let Some(token) = self.issued {
            if let Ok(value) = HeaderValue::from_str(&token) {
                response.headers_mut().insert(CART_TOKEN_HEADER, value);
            }
        }
        response
    }
}

/// GET /cart
pub async fn get_cart(
    State(state): State<AppState>,
    user: Option<Extension<User>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let caller = Caller::resolve(user, &headers)?;
    let view = state.cart_service.view(&caller.owner).await?;
    Ok(caller.respond(view))
}

/// POST /cart/items
pub async fn add_item(
    State(state): State<AppState>,
    user: Option<Extension<User>>,
    headers: HeaderMap,
    Json(item): Json<AddItem>,
) -> Result<Response, AppError> {
    let caller = Caller::resolve(user, &headers)?;
    let view = state.cart_service.add_item(&caller.owner, item).await?;
    Ok(caller.respond(view))
}

/// PATCH /cart/items/:id
pub async fn update_item(
    State(state): State<AppState>,
    user: Option<Extension<User>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(update): Json<ItemUpdate>,
) -> Result<Response, AppError> {
    let caller = Caller::resolve(user, &headers)?;
    let view = state
        .cart_service
        .update_item(&caller.owner, &CartItemId(id), update)
        .await?;
    Ok(caller.respond(view))
}

/// DELETE /cart/items/:id
pub async fn remove_item(
    State(state): State<AppState>,
    user: Option<Extension<User>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let caller = Caller::resolve(user, &headers)?;
    let view = state
        .cart_service
        .remove_item(&caller.owner, &CartItemId(id))
        .await?;
    Ok(caller.respond(view))
}

/// DELETE /cart
pub async fn clear_cart(
    State(state): State<AppState>,
    user: Option<Extension<User>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let caller = Caller::resolve(user, &headers)?;
    let view = state.cart_service.clear(&caller.owner).await?;
    Ok(caller.respond(view))
}

/// PATCH /cart
pub async fn set_preferences(
    State(state): State<AppState>,
    user: Option<Extension<User>>,
    headers: HeaderMap,
    Json(prefs): Json<CartPreferences>,
) -> Result<Response, AppError> {
    let caller = Caller::resolve(user, &headers)?;
    let view = state.cart_service.set_preferences(&caller.owner, prefs).await?;
    Ok(caller.respond(view))
}

/// POST /cart/checkout
///
/// Books an appointment from the member's cart and empties it.
pub async fn checkout(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    if user.role != Role::Member {
        return Err(AppError::Forbidden);
    }

    let draft = state.cart_service.checkout_draft(user.id, req).await?;
    let appointment = state
        .appointment_service
        .create_from_checkout(&user, &draft)
        .await?;
    state.cart_service.complete_checkout(&draft).await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}
