//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`.
//!
//! Every error response has a JSON body:
//!
//! ```json
//! {"error": "out_of_stock", "message": "...", "product_id": "...", "requested": 3, "available": 2, "shortfall": 1}
//! ```
//!
//! The stock fields are only present for `out_of_stock`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use emporium_core::ProductId;

use crate::db::StoreError;
use crate::services::ShopError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart or checkout operation failed.
    #[error(transparent)]
    Shop(#[from] ShopError),

    /// Store failure outside the engine (catalog reads, health checks).
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    product_id: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requested: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shortfall: Option<u32>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Shop(err) => match err {
                ShopError::NotFound(_) => StatusCode::NOT_FOUND,
                ShopError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                ShopError::OutOfStock { .. } | ShopError::Conflict(_) => StatusCode::CONFLICT,
                ShopError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                ShopError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Shop(err) => err.kind(),
            Self::Store(_) => "store_unavailable",
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Shop(ShopError::StoreUnavailable(_))
        )
    }

    fn body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
            product_id: None,
            requested: None,
            available: None,
            shortfall: None,
        };

        match self {
            // Don't expose store internals to clients
            Self::Store(_) | Self::Shop(ShopError::StoreUnavailable(_)) => {
                body.message = "Service temporarily unavailable".to_string();
            }
            Self::Shop(
                err @ ShopError::OutOfStock {
                    product_id,
                    requested,
                    available,
                    ..
                },
            ) => {
                body.product_id = Some(*product_id);
                body.requested = Some(*requested);
                body.available = Some(*available);
                body.shortfall = err.shortfall();
            }
            _ => {}
        }

        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "Request rejected");
        }

        (self.status(), Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
