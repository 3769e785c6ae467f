//! Order history commands.

use emporium_core::UserId;
use emporium_storefront::db::ShopStore;

use super::{CliError, connect};

/// Print a shopper's orders, oldest first.
///
/// # Errors
///
/// Returns an error if the user ID is malformed or the database is
/// unreachable.
pub async fn list(user_id: &str) -> Result<(), CliError> {
    let user_id: UserId = user_id.parse()?;
    let store = connect().await?;

    let orders = store.orders(user_id).await?;
    tracing::info!(user_id = %user_id, orders = orders.len(), "Loaded order history");

    #[allow(clippy::print_stdout)]
    for order in orders {
        println!(
            "{}  {}  {} item(s)  total {}",
            order.id,
            order.created_at.format("%Y-%m-%d %H:%M:%S"),
            order.item_count(),
            order.total
        );
        for line in &order.lines {
            println!(
                "    {} x {} @ {} = {}",
                line.quantity, line.name, line.unit_price, line.line_total
            );
        }
    }
    Ok(())
}
