//! Business logic services for the storefront.
//!
//! # Services
//!
//! - [`cart`] - Cart manager: add, remove and list cart lines
//! - [`checkout`] - Checkout engine: validate stock, snapshot prices, commit orders
//! - [`token`] - Bearer token issuing and verification
//!
//! Both engine services are generic over [`ShopStore`](crate::db::ShopStore)
//! and hold no state beyond a handle to it.

pub mod cart;
pub mod checkout;
mod error;
pub mod token;

pub use cart::CartManager;
pub use checkout::{CheckoutEngine, CheckoutReceipt};
pub use error::ShopError;
pub use token::{Claims, TokenError, TokenService};
