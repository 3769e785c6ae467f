//! Store access for the cart and checkout engine.
//!
//! # Collections
//!
//! The engine reads and writes two logical collections:
//!
//! - **Products** - keyed by product id (name, price, stock)
//! - **Users** - keyed by user id, embedding the user's cart and order history
//!
//! [`ShopStore`] is the contract the engine is written against. Two backends
//! implement it:
//!
//! - [`MemoryStore`] - in-process document store for tests and local runs
//! - [`PgStore`] - `PostgreSQL` through `sqlx`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p emporium-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use emporium_core::{ProductId, Quantity, UserId};

use crate::models::{Cart, NewProduct, Order, Product, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// A conditional write lost a race, or a uniqueness constraint was hit.
    /// Nothing was persisted.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A cart line would grow past the largest representable quantity.
    /// Nothing was persisted.
    #[error("quantity out of range")]
    QuantityOutOfRange,

    /// The store cannot serve requests.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Everything the commit step writes, as one unit.
#[derive(Debug, Clone)]
pub struct OrderCommit {
    /// The fully priced order. Its lines drive the stock decrements.
    pub order: Order,
    /// When set, the owner's cart must still be at this version and is emptied
    /// as part of the same commit.
    pub expected_cart_version: Option<i64>,
}

/// Store contract used by the cart manager and checkout engine.
///
/// Every method is a single store call. Implementations must never leave a
/// partially applied `commit_order` observable.
pub trait ShopStore: Send + Sync + 'static {
    /// Check that the store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Get a product by ID.
    fn product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, StoreError>> + Send;

    /// Get the products that exist among `ids`, in no particular order.
    fn products(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, StoreError>> + Send;

    /// List the whole catalog.
    fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, StoreError>> + Send;

    /// Case-insensitive substring search on product names.
    fn search_products(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Vec<Product>, StoreError>> + Send;

    /// Add a product to the catalog.
    fn insert_product(
        &self,
        product: NewProduct,
    ) -> impl Future<Output = Result<Product, StoreError>> + Send;

    /// Create a user with an empty cart.
    ///
    /// Fails with `StoreError::Conflict` if the username is taken.
    fn insert_user(&self, username: &str)
    -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Get a user by ID.
    fn user(&self, id: UserId) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Get a user's cart. `None` if the user does not exist.
    fn cart(&self, user_id: UserId)
    -> impl Future<Output = Result<Option<Cart>, StoreError>> + Send;

    /// Insert a cart line or increment an existing line's quantity.
    ///
    /// Fails with `StoreError::NotFound` for an unknown user.
    fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Cart, StoreError>> + Send;

    /// Remove a whole cart line. Returns `false` (and changes nothing) when
    /// the product is not in the cart.
    ///
    /// Fails with `StoreError::NotFound` for an unknown user.
    fn remove_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Atomically decrement stock for every order line, record the order and,
    /// when requested, empty the cart.
    ///
    /// Each decrement is conditional on `stock >= quantity` at commit time.
    /// Fails with `StoreError::Conflict` (nothing persisted) when any
    /// condition does not hold.
    fn commit_order(
        &self,
        commit: &OrderCommit,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// A user's order history, oldest first.
    fn orders(&self, user_id: UserId)
    -> impl Future<Output = Result<Vec<Order>, StoreError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
