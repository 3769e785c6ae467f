//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use emporium_core::UserId;

/// A shopper account.
///
/// Credentials live with the authentication collaborator; the engine only
/// needs the identity that owns a cart and an order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name chosen at signup.
    pub username: String,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}
