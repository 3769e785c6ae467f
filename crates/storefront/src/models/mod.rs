//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from database row types and
//! from the JSON shapes the HTTP layer returns.

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem, CartLineView, CartView};
pub use order::{Order, OrderLine};
pub use product::{NewProduct, Product};
pub use user::User;
