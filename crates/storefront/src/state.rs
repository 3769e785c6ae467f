//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::ShopStore;
use crate::services::{CartManager, CheckoutEngine, TokenService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store, the engine services and configuration.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<S> {
    config: StorefrontConfig,
    store: Arc<S>,
    carts: CartManager<S>,
    checkout: CheckoutEngine<S>,
    tokens: TokenService,
}

impl<S: ShopStore> AppState<S> {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Store backend shared by every service
    #[must_use]
    pub fn new(config: StorefrontConfig, store: Arc<S>) -> Self {
        let tokens = TokenService::new(
            &config.auth.jwt_secret,
            config.auth.issuer.clone(),
            config.auth.token_ttl(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                carts: CartManager::new(Arc::clone(&store)),
                checkout: CheckoutEngine::new(Arc::clone(&store)),
                store,
                tokens,
                config,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the store backend.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Get a reference to the cart manager.
    #[must_use]
    pub fn carts(&self) -> &CartManager<S> {
        &self.inner.carts
    }

    /// Get a reference to the checkout engine.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutEngine<S> {
        &self.inner.checkout
    }

    /// Get a reference to the token service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }
}
