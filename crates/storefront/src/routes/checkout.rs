//! Checkout route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use super::ItemQuery;
use crate::db::ShopStore;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::services::CheckoutReceipt;
use crate::state::AppState;

/// Check out the caller's whole cart.
#[instrument(skip(state, user_id), fields(user_id = %user_id))]
pub async fn cart<S: ShopStore>(
    State(state): State<AppState<S>>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<CheckoutReceipt>> {
    Ok(Json(state.checkout().checkout_cart(user_id).await?))
}

/// Buy a single product without touching the cart.
#[instrument(skip(state, user_id), fields(user_id = %user_id))]
pub async fn instant<S: ShopStore>(
    State(state): State<AppState<S>>,
    RequireUser(user_id): RequireUser,
    Query(query): Query<ItemQuery>,
) -> Result<Json<CheckoutReceipt>> {
    let product_id = query.product_id()?;
    let quantity = query.quantity()?;

    Ok(Json(
        state
            .checkout()
            .instant_buy(user_id, product_id, quantity)
            .await?,
    ))
}
