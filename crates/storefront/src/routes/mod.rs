//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Store reachability
//!
//! # Catalog
//! GET  /products               - Product listing
//! GET  /products/search?name=  - Case-insensitive name search
//!
//! # Cart (requires auth)
//! GET|POST /addtocart?id=&quantity=  - Add units to the cart (quantity defaults to 1)
//! GET  /removeitem?id=         - Remove a whole cart line
//! GET  /listcart               - Cart joined with live product data
//!
//! # Checkout (requires auth)
//! GET  /cartcheckout           - Check out the whole cart
//! GET  /instantbuy?id=&quantity=  - Buy one product without the cart
//! ```
//!
//! All responses are JSON. Errors use the body described in
//! [`crate::error`].

pub mod cart;
pub mod checkout;
pub mod health;
pub mod products;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    routing::get,
};
use serde::Deserialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use emporium_core::ProductId;

use crate::db::ShopStore;
use crate::error::AppError;
use crate::middleware::auth::TOKEN_HEADER;
use crate::middleware::{make_request_span, request_id_middleware};
use crate::services::ShopError;
use crate::state::AppState;

/// Query parameters naming a product and an optional quantity.
#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub id: Option<String>,
    pub quantity: Option<String>,
}

impl ItemQuery {
    /// The `id` parameter as a product ID.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `id` is missing or not a product ID.
    pub fn product_id(&self) -> Result<ProductId, AppError> {
        let id = self
            .id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ShopError::InvalidArgument("missing product id".to_string()))?;
        id.parse::<ProductId>()
            .map_err(|e| ShopError::from(e).into())
    }

    /// The `quantity` parameter, defaulting to 1.
    ///
    /// Range checks are left to the engine so every caller gets the same
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `quantity` is not an integer.
    pub fn quantity(&self) -> Result<i64, AppError> {
        match self.quantity.as_deref().map(str::trim) {
            None | Some("") => Ok(1),
            Some(raw) => raw.parse().map_err(|_| {
                ShopError::InvalidArgument(format!("quantity must be an integer (got {raw:?})"))
                    .into()
            }),
        }
    }
}

/// Create the product routes router.
pub fn product_routes<S: ShopStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(products::index::<S>))
        .route("/search", get(products::search::<S>))
}

/// Create all routes for the storefront.
pub fn routes<S: ShopStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness::<S>))
        .nest("/products", product_routes())
        .route("/addtocart", get(cart::add::<S>).post(cart::add::<S>))
        .route("/removeitem", get(cart::remove::<S>))
        .route("/listcart", get(cart::list::<S>))
        .route("/cartcheckout", get(checkout::cart::<S>))
        .route("/instantbuy", get(checkout::instant::<S>))
}

/// Build the CORS layer for the configured origins.
///
/// Origins that are not valid header values, and the `*` wildcard (which
/// cannot be combined with credentials), are skipped with a warning.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            if origin == "*" {
                tracing::warn!("Ignoring wildcard CORS origin");
                return None;
            }
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!(origin = %origin, "Ignoring invalid CORS origin"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            HeaderName::from_static(TOKEN_HEADER),
        ])
        .allow_credentials(true)
}

/// The full application: routes, state and middleware.
pub fn app<S: ShopStore>(state: AppState<S>) -> Router {
    let cors = cors_layer(&state.config().cors_origins);

    routes()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(middleware::from_fn(request_id_middleware))
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
