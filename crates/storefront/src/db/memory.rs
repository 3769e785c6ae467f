//! In-process document store.
//!
//! Products and users live in one lock-protected document set. Each user
//! document embeds its cart and order history. Every operation takes the lock
//! for a synchronous critical section only; nothing is awaited while it is
//! held, so a commit is atomic with respect to every other operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use emporium_core::{Price, ProductId, Quantity, UserId};

use super::{OrderCommit, ShopStore, StoreError};
use crate::models::{Cart, CartItem, NewProduct, Order, Product, User};

#[derive(Debug, Default)]
struct Documents {
    products: HashMap<ProductId, Product>,
    /// Catalog insertion order for listings.
    catalog: Vec<ProductId>,
    users: HashMap<UserId, UserDocument>,
}

#[derive(Debug)]
struct UserDocument {
    user: User,
    cart: Cart,
    orders: Vec<Order>,
}

/// Thread-safe in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<Documents>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Documents>, StoreError> {
        self.docs
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_owned()))
    }

    /// Overwrite a product's stock level (restocking, test setup).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the product does not exist.
    pub fn set_stock(&self, id: ProductId, stock: u32) -> Result<(), StoreError> {
        let mut docs = self.lock()?;
        let product = docs.products.get_mut(&id).ok_or(StoreError::NotFound)?;
        product.stock = stock;
        product.version += 1;
        Ok(())
    }

    /// Change a product's current price. Committed orders keep their snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the product does not exist.
    pub fn set_price(&self, id: ProductId, price: Price) -> Result<(), StoreError> {
        let mut docs = self.lock()?;
        let product = docs.products.get_mut(&id).ok_or(StoreError::NotFound)?;
        product.price = price;
        Ok(())
    }

    /// Delete a product from the catalog. Carts referencing it are untouched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the product does not exist.
    pub fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let mut docs = self.lock()?;
        docs.products.remove(&id).ok_or(StoreError::NotFound)?;
        docs.catalog.retain(|p| *p != id);
        Ok(())
    }
}

impl Documents {
    fn user_mut(&mut self, id: UserId) -> Result<&mut UserDocument, StoreError> {
        self.users.get_mut(&id).ok_or(StoreError::NotFound)
    }

    fn catalog(&self) -> impl Iterator<Item = &Product> {
        self.catalog.iter().filter_map(|id| self.products.get(id))
    }
}

impl ShopStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.lock()?.products.get(&id).cloned())
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let docs = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| docs.products.get(id).cloned())
            .collect())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.lock()?.catalog().cloned().collect())
    }

    async fn search_products(&self, name: &str) -> Result<Vec<Product>, StoreError> {
        let needle = name.to_lowercase();
        Ok(self
            .lock()?
            .catalog()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let product = Product {
            id: ProductId::generate(),
            name: product.name,
            price: product.price,
            stock: product.stock,
            version: 0,
        };
        let mut docs = self.lock()?;
        docs.catalog.push(product.id);
        docs.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn insert_user(&self, username: &str) -> Result<User, StoreError> {
        let mut docs = self.lock()?;
        if docs.users.values().any(|d| d.user.username == username) {
            return Err(StoreError::Conflict("username already exists".to_owned()));
        }
        let user = User {
            id: UserId::generate(),
            username: username.to_owned(),
            created_at: Utc::now(),
        };
        docs.users.insert(
            user.id,
            UserDocument {
                user: user.clone(),
                cart: Cart::default(),
                orders: Vec::new(),
            },
        );
        Ok(user)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).map(|d| d.user.clone()))
    }

    async fn cart(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
        Ok(self.lock()?.users.get(&user_id).map(|d| d.cart.clone()))
    }

    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Cart, StoreError> {
        let mut docs = self.lock()?;
        let cart = &mut docs.user_mut(user_id)?.cart;

        match cart.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = item
                    .quantity
                    .checked_add(quantity)
                    .map_err(|_| StoreError::QuantityOutOfRange)?;
            }
            None => cart.items.push(CartItem {
                product_id,
                quantity,
            }),
        }
        cart.version += 1;
        Ok(cart.clone())
    }

    async fn remove_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        let mut docs = self.lock()?;
        let cart = &mut docs.user_mut(user_id)?.cart;

        let before = cart.items.len();
        cart.items.retain(|i| i.product_id != product_id);
        if cart.items.len() == before {
            return Ok(false);
        }
        cart.version += 1;
        Ok(true)
    }

    async fn commit_order(&self, commit: &OrderCommit) -> Result<(), StoreError> {
        let order = &commit.order;
        let mut docs = self.lock()?;

        // Check every condition before touching anything.
        let user = docs.users.get(&order.user_id).ok_or(StoreError::NotFound)?;
        if let Some(expected) = commit.expected_cart_version
            && user.cart.version != expected
        {
            return Err(StoreError::Conflict(format!(
                "cart changed (expected version {expected}, found {})",
                user.cart.version
            )));
        }

        let mut demand: HashMap<ProductId, u64> = HashMap::new();
        for line in &order.lines {
            *demand.entry(line.product_id).or_default() += u64::from(line.quantity.get());
        }
        for (product_id, wanted) in &demand {
            let product = docs
                .products
                .get(product_id)
                .ok_or_else(|| StoreError::Conflict(format!("product {product_id} was removed")))?;
            if u64::from(product.stock) < *wanted {
                return Err(StoreError::Conflict(format!(
                    "insufficient stock for product {product_id}"
                )));
            }
        }

        // Apply.
        for (product_id, wanted) in demand {
            if let Some(product) = docs.products.get_mut(&product_id) {
                // wanted <= stock, checked above
                let wanted = u32::try_from(wanted).unwrap_or(u32::MAX);
                product.stock = product.stock.saturating_sub(wanted);
                product.version += 1;
            }
        }
        let user = docs.user_mut(order.user_id)?;
        if commit.expected_cart_version.is_some() {
            user.cart.items.clear();
            user.cart.version += 1;
        }
        user.orders.push(order.clone());
        Ok(())
    }

    async fn orders(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let docs = self.lock()?;
        let user = docs.users.get(&user_id).ok_or(StoreError::NotFound)?;
        Ok(user.orders.clone())
    }
}
