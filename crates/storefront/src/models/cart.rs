//! Cart types.

use serde::Serialize;

use emporium_core::{Price, ProductId, Quantity};

/// A product reference and quantity in a user's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartItem {
    /// Referenced product.
    pub product_id: ProductId,
    /// Units wanted.
    pub quantity: Quantity,
}

/// A user's cart as stored.
///
/// Each product appears at most once. `version` moves forward on every
/// mutation so a checkout can tell whether the cart changed under it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    /// Lines in the order they were first added.
    pub items: Vec<CartItem>,
    /// Mutation counter.
    pub version: i64,
}

impl Cart {
    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find the line for a product.
    #[must_use]
    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }
}

/// A cart line joined with live catalog data for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    /// Referenced product.
    pub product_id: ProductId,
    /// Current product name, if the product still exists.
    pub name: Option<String>,
    /// Current unit price, if the product still exists.
    pub price: Option<Price>,
    /// Current stock, if the product still exists.
    pub stock: Option<u32>,
    /// Units in the cart.
    pub quantity: Quantity,
    /// `price * quantity` at current prices.
    pub line_total: Option<Price>,
    /// False when the product has been removed from the catalog.
    pub available: bool,
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    /// Lines in cart order.
    pub items: Vec<CartLineView>,
    /// Total units across lines.
    pub item_count: u64,
    /// Sum of available line totals at current prices.
    pub subtotal: Price,
}

impl CartView {
    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            item_count: 0,
            subtotal: Price::ZERO,
        }
    }
}
