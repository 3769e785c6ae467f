//! Cart route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Serialize;
use tracing::instrument;

use emporium_core::{ProductId, Quantity};

use super::ItemQuery;
use crate::db::ShopStore;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::CartView;
use crate::state::AppState;

/// Response for cart mutations.
#[derive(Debug, Serialize)]
pub struct CartUpdate {
    pub message: &'static str,
    pub product_id: ProductId,
    /// Units of the product now in the cart; absent after removal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
    /// Number of lines in the cart.
    pub lines: usize,
}

/// Add units of a product to the caller's cart.
#[instrument(skip(state, user_id), fields(user_id = %user_id))]
pub async fn add<S: ShopStore>(
    State(state): State<AppState<S>>,
    RequireUser(user_id): RequireUser,
    Query(query): Query<ItemQuery>,
) -> Result<Json<CartUpdate>> {
    let product_id = query.product_id()?;
    let quantity = query.quantity()?;

    let cart = state
        .carts()
        .add_to_cart(user_id, product_id, quantity)
        .await?;

    Ok(Json(CartUpdate {
        message: "added to cart",
        product_id,
        quantity: cart.item(product_id).map(|item| item.quantity),
        lines: cart.items.len(),
    }))
}

/// Remove a product's whole line from the caller's cart.
#[instrument(skip(state, user_id), fields(user_id = %user_id))]
pub async fn remove<S: ShopStore>(
    State(state): State<AppState<S>>,
    RequireUser(user_id): RequireUser,
    Query(query): Query<ItemQuery>,
) -> Result<Json<CartUpdate>> {
    let product_id = query.product_id()?;

    state.carts().remove_item(user_id, product_id).await?;
    let view = state.carts().get_cart(user_id).await?;

    Ok(Json(CartUpdate {
        message: "removed from cart",
        product_id,
        quantity: None,
        lines: view.items.len(),
    }))
}

/// The caller's cart with live product data.
#[instrument(skip(state, user_id), fields(user_id = %user_id))]
pub async fn list<S: ShopStore>(
    State(state): State<AppState<S>>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<CartView>> {
    Ok(Json(state.carts().get_cart(user_id).await?))
}
