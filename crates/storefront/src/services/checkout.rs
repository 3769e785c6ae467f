//! Checkout engine.
//!
//! Turns a user's whole cart, or a single ad-hoc line, into a committed order:
//!
//! 1. re-read every product and reject the whole operation if any line is
//!    short on stock or refers to a removed product
//! 2. snapshot unit prices into order lines and total them
//! 3. hand the priced order to [`ShopStore::commit_order`], which decrements
//!    stock, appends the order and (for a cart checkout) empties the cart as
//!    one unit
//!
//! A `Conflict` from the commit step means nothing was written. The engine
//! re-runs the whole algorithm once before giving up.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use emporium_core::{CheckoutState, OrderId, Price, ProductId, Quantity, UserId};

use super::ShopError;
use crate::db::{OrderCommit, ShopStore};
use crate::models::{Order, OrderLine, Product};

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutReceipt {
    /// The committed order.
    pub order: Order,
    /// Terminal state of the operation. Always `Committed` on success.
    pub state: CheckoutState,
}

/// What a checkout buys.
#[derive(Debug, Clone, Copy)]
enum Basket {
    /// Every line in the user's cart; the cart is emptied on success.
    Cart,
    /// One line that never touches the cart.
    Instant {
        product_id: ProductId,
        quantity: Quantity,
    },
}

impl Basket {
    const fn label(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Instant { .. } => "instant",
        }
    }
}

/// Tracks one attempt through the checkout state machine.
struct Run {
    user_id: UserId,
    state: CheckoutState,
}

impl Run {
    const fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            state: CheckoutState::Pending,
        }
    }

    fn advance(&mut self, next: CheckoutState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal checkout transition {} -> {next}",
            self.state
        );
        tracing::debug!(user_id = %self.user_id, from = %self.state, to = %next, "Checkout transition");
        self.state = next;
    }

    fn reject(&mut self, err: ShopError) -> ShopError {
        self.advance(CheckoutState::Rejected);
        tracing::warn!(user_id = %self.user_id, kind = err.kind(), error = %err, "Checkout rejected");
        err
    }
}

/// Checkout operations over a [`ShopStore`].
pub struct CheckoutEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for CheckoutEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ShopStore> CheckoutEngine<S> {
    /// Create a checkout engine.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Check out every line in the user's cart and empty it.
    ///
    /// # Errors
    ///
    /// - `ShopError::NotFound` for an unknown user or a removed product
    /// - `ShopError::InvalidArgument` if the cart is empty
    /// - `ShopError::OutOfStock` if any line exceeds live stock
    /// - `ShopError::Conflict` if stock or the cart changed twice in a row
    ///   between validation and commit
    /// - `ShopError::StoreUnavailable` if the store failed
    ///
    /// On any error neither stock nor the cart has changed.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn checkout_cart(&self, user_id: UserId) -> Result<CheckoutReceipt, ShopError> {
        self.run_with_retry(user_id, Basket::Cart).await
    }

    /// Buy `quantity` units of one product without touching the cart.
    ///
    /// # Errors
    ///
    /// As [`Self::checkout_cart`], except that an empty cart is irrelevant and
    /// `ShopError::InvalidArgument` is returned for `quantity < 1`.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn instant_buy(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CheckoutReceipt, ShopError> {
        let quantity = Quantity::new(quantity)?;
        self.run_with_retry(
            user_id,
            Basket::Instant {
                product_id,
                quantity,
            },
        )
        .await
    }

    async fn run_with_retry(
        &self,
        user_id: UserId,
        basket: Basket,
    ) -> Result<CheckoutReceipt, ShopError> {
        match self.attempt(user_id, basket).await {
            Err(err) if err.is_retryable() => {
                tracing::info!(user_id = %user_id, basket = basket.label(), error = %err, "Retrying checkout after conflict");
                self.attempt(user_id, basket).await
            }
            result => result,
        }
    }

    async fn attempt(&self, user_id: UserId, basket: Basket) -> Result<CheckoutReceipt, ShopError> {
        let mut run = Run::new(user_id);
        run.advance(CheckoutState::Validating);

        let (wanted, expected_cart_version) = match self.basket_lines(user_id, basket).await {
            Ok(lines) => lines,
            Err(err) => return Err(run.reject(err)),
        };

        let order = match self.price_order(user_id, &wanted).await {
            Ok(order) => order,
            Err(err) => return Err(run.reject(err)),
        };

        run.advance(CheckoutState::Committing);
        let commit = OrderCommit {
            order,
            expected_cart_version,
        };
        if let Err(err) = self.store.commit_order(&commit).await {
            let err = ShopError::from_store(err, || format!("user {user_id}"));
            run.advance(CheckoutState::RolledBack);
            tracing::warn!(user_id = %user_id, kind = err.kind(), error = %err, "Checkout rolled back");
            return Err(err);
        }

        run.advance(CheckoutState::Committed);
        let order = commit.order;
        tracing::info!(
            user_id = %user_id,
            order_id = %order.id,
            basket = basket.label(),
            items = order.item_count(),
            total = %order.total,
            "Checkout committed"
        );

        Ok(CheckoutReceipt {
            order,
            state: run.state,
        })
    }

    /// Resolve the lines to buy and, for a cart checkout, the cart version
    /// they were read at.
    async fn basket_lines(
        &self,
        user_id: UserId,
        basket: Basket,
    ) -> Result<(Vec<(ProductId, Quantity)>, Option<i64>), ShopError> {
        match basket {
            Basket::Cart => {
                let cart = self
                    .store
                    .cart(user_id)
                    .await?
                    .ok_or_else(|| ShopError::NotFound(format!("user {user_id}")))?;
                if cart.is_empty() {
                    return Err(ShopError::InvalidArgument("cart is empty".to_owned()));
                }
                let lines = cart
                    .items
                    .iter()
                    .map(|item| (item.product_id, item.quantity))
                    .collect();
                Ok((lines, Some(cart.version)))
            }
            Basket::Instant {
                product_id,
                quantity,
            } => {
                if self.store.user(user_id).await?.is_none() {
                    return Err(ShopError::NotFound(format!("user {user_id}")));
                }
                Ok((vec![(product_id, quantity)], None))
            }
        }
    }

    /// Check live stock for every line and build the order with snapshot
    /// prices. Lines are checked in order; the first failure wins.
    async fn price_order(
        &self,
        user_id: UserId,
        wanted: &[(ProductId, Quantity)],
    ) -> Result<Order, ShopError> {
        let ids: Vec<ProductId> = wanted.iter().map(|(id, _)| *id).collect();
        let products: HashMap<ProductId, Product> = self
            .store
            .products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(wanted.len());
        for &(product_id, quantity) in wanted {
            let product = products
                .get(&product_id)
                .ok_or_else(|| ShopError::NotFound(format!("product {product_id}")))?;
            if !product.has_stock_for(quantity) {
                return Err(ShopError::OutOfStock {
                    product_id,
                    name: product.name.clone(),
                    requested: quantity.get(),
                    available: product.stock,
                });
            }
            lines.push(OrderLine {
                product_id,
                name: product.name.clone(),
                unit_price: product.price,
                quantity,
                line_total: product.price.times(quantity)?,
            });
        }

        let total = Price::try_sum(lines.iter().map(|l| l.line_total))?;
        Ok(Order {
            id: OrderId::generate(),
            user_id,
            lines,
            total,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::db::{MemoryStore, StoreError};
    use crate::models::{Cart, NewProduct, User};
    use crate::services::CartManager;

    async fn product(store: &MemoryStore, name: &str, cents: u64, stock: u32) -> Product {
        store
            .insert_product(NewProduct {
                name: name.to_string(),
                price: Price::from_cents(cents),
                stock,
            })
            .await
            .unwrap()
    }

    async fn stock_of(store: &MemoryStore, id: ProductId) -> u32 {
        store.product(id).await.unwrap().unwrap().stock
    }

    struct Shop {
        store: Arc<MemoryStore>,
        carts: CartManager<MemoryStore>,
        checkout: CheckoutEngine<MemoryStore>,
        user: User,
    }

    async fn shop() -> Shop {
        let store = Arc::new(MemoryStore::new());
        let user = store.insert_user("shopper").await.unwrap();
        Shop {
            carts: CartManager::new(Arc::clone(&store)),
            checkout: CheckoutEngine::new(Arc::clone(&store)),
            store,
            user,
        }
    }

    #[tokio::test]
    async fn test_checkout_cart_commits_and_clears() {
        let s = shop().await;
        let mug = product(&s.store, "Mug", 1250, 10).await;
        let lamp = product(&s.store, "Lamp", 4000, 3).await;
        s.carts.add_to_cart(s.user.id, mug.id, 2).await.unwrap();
        s.carts.add_to_cart(s.user.id, lamp.id, 1).await.unwrap();

        let receipt = s.checkout.checkout_cart(s.user.id).await.unwrap();

        assert_eq!(receipt.state, CheckoutState::Committed);
        assert_eq!(receipt.order.lines.len(), 2);
        assert_eq!(receipt.order.lines[0].product_id, mug.id);
        assert_eq!(receipt.order.lines[0].line_total, Price::from_cents(2500));
        assert_eq!(receipt.order.total, Price::from_cents(6500));
        assert_eq!(stock_of(&s.store, mug.id).await, 8);
        assert_eq!(stock_of(&s.store, lamp.id).await, 2);
        assert!(s.store.cart(s.user.id).await.unwrap().unwrap().is_empty());

        let orders = s.store.orders(s.user.id).await.unwrap();
        assert_eq!(orders, vec![receipt.order]);
    }

    #[tokio::test]
    async fn test_short_line_commits_nothing() {
        let s = shop().await;
        let mug = product(&s.store, "Mug", 1250, 10).await;
        let lamp = product(&s.store, "Lamp", 4000, 1).await;
        s.carts.add_to_cart(s.user.id, mug.id, 2).await.unwrap();
        s.carts.add_to_cart(s.user.id, lamp.id, 3).await.unwrap();
        let cart_before = s.store.cart(s.user.id).await.unwrap().unwrap();

        let err = s.checkout.checkout_cart(s.user.id).await.unwrap_err();

        match err {
            ShopError::OutOfStock {
                product_id,
                requested,
                available,
                ..
            } => {
                assert_eq!(product_id, lamp.id);
                assert_eq!(requested, 3);
                assert_eq!(available, 1);
            }
            other => panic!("expected OutOfStock, got {other:?}"),
        }
        assert_eq!(stock_of(&s.store, mug.id).await, 10);
        assert_eq!(stock_of(&s.store, lamp.id).await, 1);
        assert_eq!(s.store.cart(s.user.id).await.unwrap().unwrap(), cart_before);
        assert!(s.store.orders(s.user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_is_invalid() {
        let s = shop().await;
        let err = s.checkout.checkout_cart(s.user.id).await.unwrap_err();
        assert!(matches!(err, ShopError::InvalidArgument(ref m) if m == "cart is empty"));
    }

    #[tokio::test]
    async fn test_unknown_user_not_found() {
        let s = shop().await;
        let mug = product(&s.store, "Mug", 1250, 10).await;

        let err = s.checkout.checkout_cart(UserId::generate()).await.unwrap_err();
        assert!(matches!(err, ShopError::NotFound(_)));

        let err = s
            .checkout
            .instant_buy(UserId::generate(), mug.id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::NotFound(_)));
        assert_eq!(stock_of(&s.store, mug.id).await, 10);
    }

    #[tokio::test]
    async fn test_removed_product_not_found() {
        let s = shop().await;
        let mug = product(&s.store, "Mug", 1250, 10).await;
        s.carts.add_to_cart(s.user.id, mug.id, 1).await.unwrap();
        s.store.delete_product(mug.id).unwrap();

        let err = s.checkout.checkout_cart(s.user.id).await.unwrap_err();
        assert!(matches!(err, ShopError::NotFound(ref what) if what.starts_with("product")));
        assert_eq!(s.store.cart(s.user.id).await.unwrap().unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_instant_buy_leaves_cart_alone() {
        let s = shop().await;
        let mug = product(&s.store, "Mug", 1250, 10).await;
        let lamp = product(&s.store, "Lamp", 4000, 3).await;
        s.carts.add_to_cart(s.user.id, mug.id, 2).await.unwrap();
        let cart_before = s.store.cart(s.user.id).await.unwrap().unwrap();

        let receipt = s.checkout.instant_buy(s.user.id, lamp.id, 2).await.unwrap();

        assert_eq!(receipt.order.total, Price::from_cents(8000));
        assert_eq!(stock_of(&s.store, lamp.id).await, 1);
        assert_eq!(stock_of(&s.store, mug.id).await, 10);
        assert_eq!(s.store.cart(s.user.id).await.unwrap().unwrap(), cart_before);
    }

    #[tokio::test]
    async fn test_instant_buy_rejects_bad_quantity() {
        let s = shop().await;
        let mug = product(&s.store, "Mug", 1250, 10).await;
        let err = s.checkout.instant_buy(s.user.id, mug.id, 0).await.unwrap_err();
        assert!(matches!(err, ShopError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_order_keeps_price_snapshot() {
        let s = shop().await;
        let mug = product(&s.store, "Mug", 1250, 10).await;
        let receipt = s.checkout.instant_buy(s.user.id, mug.id, 2).await.unwrap();

        s.store.set_price(mug.id, Price::from_cents(9999)).unwrap();

        let orders = s.store.orders(s.user.id).await.unwrap();
        assert_eq!(orders[0].lines[0].unit_price, Price::from_cents(1250));
        assert_eq!(orders[0].total, receipt.order.total);
    }

    #[tokio::test]
    async fn test_exact_decimal_totals() {
        let s = shop().await;
        let dime = product(&s.store, "Dime", 10, 100).await;
        let receipt = s.checkout.instant_buy(s.user.id, dime.id, 3).await.unwrap();
        assert_eq!(receipt.order.total.to_string(), "0.30");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_buyers_of_last_units() {
        let s = shop().await;
        let p1 = product(&s.store, "p1", 1000, 5).await.id;
        let other = s.store.insert_user("other").await.unwrap();

        let a = {
            let engine = s.checkout.clone();
            let user = s.user.id;
            tokio::spawn(async move { engine.instant_buy(user, p1, 3).await })
        };
        let b = {
            let engine = s.checkout.clone();
            tokio::spawn(async move { engine.instant_buy(other.id, p1, 3).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let committed: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].order.total, Price::from_cents(3000));
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(ShopError::OutOfStock { .. })))
        );
        assert_eq!(stock_of(&s.store, p1).await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_buyers_never_oversell() {
        const STOCK: u32 = 20;
        const EACH: i64 = 3;
        const BUYERS: usize = 16;

        let s = shop().await;
        let widget = product(&s.store, "Widget", 500, STOCK).await.id;

        let mut handles = Vec::with_capacity(BUYERS);
        for n in 0..BUYERS {
            let user = s.store.insert_user(&format!("buyer-{n}")).await.unwrap();
            let engine = s.checkout.clone();
            handles.push(tokio::spawn(async move {
                engine.instant_buy(user.id, widget, EACH).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(ShopError::OutOfStock { .. } | ShopError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(successes, 6);
        assert_eq!(stock_of(&s.store, widget).await, 2);
    }

    type CommitHook = Box<dyn Fn(&MemoryStore, &OrderCommit, usize) -> Option<StoreError> + Send + Sync>;

    /// Delegates to a `MemoryStore`, running a hook before each commit.
    struct Contended {
        inner: MemoryStore,
        commits: AtomicUsize,
        before_commit: CommitHook,
    }

    impl ShopStore for Contended {
        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
        async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
            self.inner.product(id).await
        }
        async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
            self.inner.products(ids).await
        }
        async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
            self.inner.list_products().await
        }
        async fn search_products(&self, name: &str) -> Result<Vec<Product>, StoreError> {
            self.inner.search_products(name).await
        }
        async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
            self.inner.insert_product(product).await
        }
        async fn insert_user(&self, username: &str) -> Result<User, StoreError> {
            self.inner.insert_user(username).await
        }
        async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
            self.inner.user(id).await
        }
        async fn cart(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
            self.inner.cart(user_id).await
        }
        async fn add_cart_item(
            &self,
            user_id: UserId,
            product_id: ProductId,
            quantity: Quantity,
        ) -> Result<Cart, StoreError> {
            self.inner.add_cart_item(user_id, product_id, quantity).await
        }
        async fn remove_cart_item(
            &self,
            user_id: UserId,
            product_id: ProductId,
        ) -> Result<bool, StoreError> {
            self.inner.remove_cart_item(user_id, product_id).await
        }
        async fn commit_order(&self, commit: &OrderCommit) -> Result<(), StoreError> {
            let n = self.commits.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = (self.before_commit)(&self.inner, commit, n) {
                return Err(err);
            }
            self.inner.commit_order(commit).await
        }
        async fn orders(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
            self.inner.orders(user_id).await
        }
    }

    /// Poll a future that never suspends. Memory store futures complete on
    /// first poll.
    fn ready<F: std::future::Future>(fut: F) -> F::Output {
        use std::task::{Context, Poll, Waker};

        let mut fut = std::pin::pin!(fut);
        match fut.as_mut().poll(&mut Context::from_waker(Waker::noop())) {
            Poll::Ready(out) => out,
            Poll::Pending => panic!("memory store future suspended"),
        }
    }

    async fn contended(
        stock: u32,
        before_commit: impl Fn(&MemoryStore, &OrderCommit, usize) -> Option<StoreError>
        + Send
        + Sync
        + 'static,
    ) -> (Arc<Contended>, User, Product) {
        let inner = MemoryStore::new();
        let user = inner.insert_user("shopper").await.unwrap();
        let mug = product(&inner, "Mug", 1250, stock).await;
        let store = Arc::new(Contended {
            inner,
            commits: AtomicUsize::new(0),
            before_commit: Box::new(before_commit),
        });
        (store, user, mug)
    }

    #[tokio::test]
    async fn test_conflict_is_retried_once_then_commits() {
        let (store, user, mug) = contended(10, |_, _, n| {
            (n == 0).then(|| StoreError::Conflict("lost the race".to_owned()))
        })
        .await;
        let engine = CheckoutEngine::new(Arc::clone(&store));

        let receipt = engine.instant_buy(user.id, mug.id, 2).await.unwrap();

        assert_eq!(receipt.state, CheckoutState::Committed);
        assert_eq!(store.commits.load(Ordering::SeqCst), 2);
        assert_eq!(stock_of(&store.inner, mug.id).await, 8);
    }

    #[tokio::test]
    async fn test_persistent_conflict_surfaces_after_one_retry() {
        let (store, user, mug) =
            contended(10, |_, _, _| Some(StoreError::Conflict("always".to_owned()))).await;
        let engine = CheckoutEngine::new(Arc::clone(&store));

        let err = engine.instant_buy(user.id, mug.id, 2).await.unwrap_err();

        assert!(matches!(err, ShopError::Conflict(_)));
        assert_eq!(store.commits.load(Ordering::SeqCst), 2);
        assert_eq!(stock_of(&store.inner, mug.id).await, 10);
        assert!(store.inner.orders(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stock_taken_before_commit_is_out_of_stock_on_retry() {
        // Another shopper drains the product between validation and commit.
        let (store, user, mug) = contended(5, |inner, commit, n| {
            if n == 0 {
                inner.set_stock(commit.order.lines[0].product_id, 1).unwrap();
            }
            None
        })
        .await;
        let engine = CheckoutEngine::new(Arc::clone(&store));

        let err = engine.instant_buy(user.id, mug.id, 3).await.unwrap_err();

        assert!(matches!(err, ShopError::OutOfStock { available: 1, .. }));
        assert_eq!(store.commits.load(Ordering::SeqCst), 1);
        assert_eq!(stock_of(&store.inner, mug.id).await, 1);
        assert!(store.inner.orders(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cart_changed_before_commit_retries_with_new_cart() {
        let (store, user, mug) = contended(10, |inner, commit, n| {
            if n == 0 {
                let line = &commit.order.lines[0];
                ready(inner.add_cart_item(commit.order.user_id, line.product_id, Quantity::ONE))
                    .unwrap();
            }
            None
        })
        .await;
        let carts = CartManager::new(Arc::clone(&store));
        let engine = CheckoutEngine::new(Arc::clone(&store));
        carts.add_to_cart(user.id, mug.id, 1).await.unwrap();

        let receipt = engine.checkout_cart(user.id).await.unwrap();

        assert_eq!(store.commits.load(Ordering::SeqCst), 2);
        assert_eq!(receipt.order.lines[0].quantity.get(), 2);
        assert_eq!(stock_of(&store.inner, mug.id).await, 8);
        assert!(store.inner.cart(user.id).await.unwrap().unwrap().is_empty());
    }
}
