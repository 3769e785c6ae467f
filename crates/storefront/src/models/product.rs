//! Catalog product types.

use serde::{Deserialize, Serialize};

use emporium_core::{Price, ProductId, Quantity};

/// A product as held in the catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Product display name.
    pub name: String,
    /// Current unit price.
    pub price: Price,
    /// Units available for sale. Never negative.
    pub stock: u32,
    /// Bumped on every stock change.
    #[serde(skip)]
    pub version: i64,
}

impl Product {
    /// Whether `quantity` units can be sold right now.
    #[must_use]
    pub const fn has_stock_for(&self, quantity: Quantity) -> bool {
        self.stock >= quantity.get()
    }
}

/// Input for adding a product to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    /// Product display name.
    pub name: String,
    /// Unit price.
    pub price: Price,
    /// Initial stock.
    pub stock: u32,
}
