//! Shopper management commands.
//!
//! # Usage
//!
//! ```bash
//! emporium user create --username alice
//! ```

use emporium_storefront::db::ShopStore;

use super::{CliError, connect};

/// Create a shopper and print their ID.
///
/// # Errors
///
/// Returns an error if the username is blank or taken, or the database is
/// unreachable.
pub async fn create(username: &str) -> Result<(), CliError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(CliError::InvalidInput("username cannot be empty".to_owned()));
    }

    let store = connect().await?;
    let user = store.insert_user(username).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "Created shopper");

    #[allow(clippy::print_stdout)]
    {
        println!("{}", user.id);
    }
    Ok(())
}
