//! Order types.
//!
//! Orders hold product snapshots rather than live references, so later price
//! or stock changes never alter a historical order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use emporium_core::{OrderId, Price, ProductId, Quantity, UserId};

/// One line of a committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    /// Product the line was bought from.
    pub product_id: ProductId,
    /// Product name at purchase time.
    pub name: String,
    /// Unit price at purchase time.
    pub unit_price: Price,
    /// Units bought.
    pub quantity: Quantity,
    /// `unit_price * quantity`.
    pub line_total: Price,
}

/// An immutable record of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Owner of the order.
    pub user_id: UserId,
    /// Lines in checkout order.
    pub lines: Vec<OrderLine>,
    /// Sum of line totals.
    pub total: Price,
    /// When the order was committed.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity.get())).sum()
    }
}
