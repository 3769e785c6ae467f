//! Cart manager.
//!
//! Adds and removes lines in a user's cart and renders the cart joined with
//! live catalog data. Stock is not checked here; it is enforced only at
//! checkout, so a cart may ask for more than is currently available.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::instrument;

use emporium_core::{Price, ProductId, Quantity, UserId};

use super::ShopError;
use crate::db::ShopStore;
use crate::models::{Cart, CartLineView, CartView, Product};

/// Cart operations over a [`ShopStore`].
pub struct CartManager<S> {
    store: Arc<S>,
}

impl<S> Clone for CartManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ShopStore> CartManager<S> {
    /// Create a cart manager.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Add `quantity` units of a product to the user's cart.
    ///
    /// A product already in the cart has its line quantity increased; a new
    /// product is appended as a new line.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::InvalidArgument` if `quantity < 1` or the line
    /// would exceed the largest representable quantity.
    /// Returns `ShopError::NotFound` if the product or user is unknown.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, ShopError> {
        let quantity = Quantity::new(quantity)?;

        if self.store.product(product_id).await?.is_none() {
            return Err(ShopError::NotFound(format!("product {product_id}")));
        }

        let cart = self
            .store
            .add_cart_item(user_id, product_id, quantity)
            .await
            .map_err(|e| ShopError::from_store(e, || format!("user {user_id}")))?;

        tracing::info!(quantity = quantity.get(), lines = cart.items.len(), "Added to cart");
        Ok(cart)
    }

    /// Remove a product's whole line from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the product is not in the cart or the
    /// user is unknown. The cart is left unchanged.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove_item(&self, user_id: UserId, product_id: ProductId) -> Result<(), ShopError> {
        let removed = self
            .store
            .remove_cart_item(user_id, product_id)
            .await
            .map_err(|e| ShopError::from_store(e, || format!("user {user_id}")))?;

        if !removed {
            return Err(ShopError::NotFound(format!(
                "product {product_id} in cart"
            )));
        }

        tracing::info!("Removed from cart");
        Ok(())
    }

    /// Get the user's cart joined with live product name, price and stock.
    ///
    /// Read-only.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the user is unknown.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView, ShopError> {
        let cart = self
            .store
            .cart(user_id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("user {user_id}")))?;

        if cart.is_empty() {
            return Ok(CartView::empty());
        }

        let ids: Vec<ProductId> = cart.items.iter().map(|i| i.product_id).collect();
        let products: HashMap<ProductId, Product> = self
            .store
            .products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        build_view(&cart, &products)
    }
}

fn build_view(cart: &Cart, products: &HashMap<ProductId, Product>) -> Result<CartView, ShopError> {
    let mut items = Vec::with_capacity(cart.items.len());
    for item in &cart.items {
        let line = match products.get(&item.product_id) {
            Some(product) => CartLineView {
                product_id: item.product_id,
                name: Some(product.name.clone()),
                price: Some(product.price),
                stock: Some(product.stock),
                quantity: item.quantity,
                line_total: Some(product.price.times(item.quantity)?),
                available: true,
            },
            None => {
                tracing::warn!(product_id = %item.product_id, "Cart references a removed product");
                CartLineView {
                    product_id: item.product_id,
                    name: None,
                    price: None,
                    stock: None,
                    quantity: item.quantity,
                    line_total: None,
                    available: false,
                }
            }
        };
        items.push(line);
    }

    let item_count = items.iter().map(|l| u64::from(l.quantity.get())).sum();
    let subtotal = Price::try_sum(items.iter().filter_map(|l| l.line_total))?;

    Ok(CartView {
        items,
        item_count,
        subtotal,
    })
}
