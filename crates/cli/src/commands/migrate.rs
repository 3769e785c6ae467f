//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! emporium migrate
//! ```
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded in the
//! binary at compile time.

use super::{CliError, connect};

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails,
/// or a migration fails to apply.
pub async fn storefront() -> Result<(), CliError> {
    let store = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations")
        .run(store.pool())
        .await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
