//! Engine error taxonomy.

use thiserror::Error;

use emporium_core::{IdError, PriceError, ProductId, QuantityError};

use crate::db::StoreError;

/// Errors returned by the cart manager and checkout engine.
///
/// Errors are never swallowed; each is returned verbatim to the caller.
#[derive(Debug, Error)]
pub enum ShopError {
    /// Unknown user, product or cart line.
    #[error("{0} not found")]
    NotFound(String),

    /// Non-positive quantity, malformed identifier and similar.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Not enough stock at validation time.
    #[error("out of stock: {name} has {available} available, {requested} requested")]
    OutOfStock {
        /// Offending product.
        product_id: ProductId,
        /// Product name at validation time.
        name: String,
        /// Units asked for.
        requested: u32,
        /// Units in stock.
        available: u32,
    },

    /// Stock or cart changed between validation and commit. Nothing was
    /// persisted; safe to retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The underlying store failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// The caller's identity could not be established.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl ShopError {
    /// Map a store error, naming `what` if the store reports it missing.
    pub(crate) fn from_store(err: StoreError, what: impl FnOnce() -> String) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound(what()),
            StoreError::Conflict(reason) => Self::Conflict(reason),
            StoreError::QuantityOutOfRange => {
                Self::InvalidArgument("quantity out of range".to_owned())
            }
            other => Self::StoreUnavailable(other),
        }
    }

    /// Whether the operation may be re-run as-is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Units missing for an `OutOfStock` error.
    #[must_use]
    pub const fn shortfall(&self) -> Option<u32> {
        match self {
            Self::OutOfStock {
                requested,
                available,
                ..
            } => Some(requested.saturating_sub(*available)),
            _ => None,
        }
    }

    /// Short machine-readable kind, used in HTTP bodies and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::OutOfStock { .. } => "out_of_stock",
            Self::Conflict(_) => "conflict",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Unauthorized(_) => "unauthorized",
        }
    }
}

impl From<StoreError> for ShopError {
    fn from(err: StoreError) -> Self {
        Self::from_store(err, || "record".to_owned())
    }
}

impl From<QuantityError> for ShopError {
    fn from(err: QuantityError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<IdError> for ShopError {
    fn from(err: IdError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<PriceError> for ShopError {
    fn from(err: PriceError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
