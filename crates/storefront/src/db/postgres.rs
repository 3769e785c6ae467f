//! `PostgreSQL` store.
//!
//! The user document is normalized into `shop_user`, `cart_item`,
//! `shop_order` and `order_line`. Cart mutations lock the owning `shop_user`
//! row (via the `cart_version` bump) so concurrent edits to one cart
//! serialize. Commit is one transaction; each stock decrement is a
//! conditional `UPDATE ... WHERE stock >= $n`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use emporium_core::{OrderId, Price, ProductId, Quantity, UserId};

use super::{OrderCommit, ShopStore, StoreError};
use crate::models::{Cart, CartItem, NewProduct, Order, OrderLine, Product, User};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    price: Price,
    stock: i64,
    version: i64,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let stock = u32::try_from(row.stock).map_err(|_| {
            StoreError::DataCorruption(format!("stock out of range for {}: {}", row.id, row.stock))
        })?;
        Ok(Self {
            id: row.id,
            name: row.name,
            price: row.price,
            stock,
            version: row.version,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    product_id: ProductId,
    quantity: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    total: Price,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    order_id: OrderId,
    product_id: ProductId,
    name: String,
    unit_price: Price,
    quantity: i64,
    line_total: Price,
}

fn quantity_from_row(value: i64) -> Result<Quantity, StoreError> {
    Quantity::new(value)
        .map_err(|e| StoreError::DataCorruption(format!("invalid stored quantity: {e}")))
}

fn products_from_rows(rows: Vec<ProductRow>) -> Result<Vec<Product>, StoreError> {
    rows.into_iter().map(Product::try_from).collect()
}

const PRODUCT_COLUMNS: &str = "id, name, price, stock, version";

async fn insert_product_row<'e, E>(executor: E, product: &NewProduct) -> Result<Product, StoreError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "INSERT INTO storefront.product (id, name, price, stock) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(ProductId::generate())
    .bind(&product.name)
    .bind(product.price)
    .bind(i64::from(product.stock))
    .fetch_one(executor)
    .await?;

    Product::try_from(row)
}

async fn load_cart_items<'e, E>(executor: E, user_id: UserId) -> Result<Vec<CartItem>, StoreError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT product_id, quantity
        FROM storefront.cart_item
        WHERE user_id = $1
        ORDER BY position ASC
        ",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(CartItem {
                product_id: r.product_id,
                quantity: quantity_from_row(r.quantity)?,
            })
        })
        .collect()
}

// =============================================================================
// Store
// =============================================================================

/// `PostgreSQL`-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a batch of products in one transaction.
    ///
    /// Either every product is added or none is.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if any insert fails; the batch is rolled back.
    pub async fn insert_products(
        &self,
        products: &[NewProduct],
    ) -> Result<Vec<Product>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(products.len());
        for product in products {
            inserted.push(insert_product_row(&mut *tx, product).await?);
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

impl ShopStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        products_from_rows(rows)
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        products_from_rows(rows)
    }

    async fn search_products(&self, name: &str) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product \
             WHERE position(lower($1) in lower(name)) > 0 \
             ORDER BY created_at, id"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        products_from_rows(rows)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        insert_product_row(&self.pool, &product).await
    }

    async fn insert_user(&self, username: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO storefront.shop_user (id, username)
            VALUES ($1, $2)
            RETURNING id, username, created_at
            ",
        )
        .bind(UserId::generate())
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict("username already exists".to_owned());
            }
            StoreError::Database(e)
        })?;

        Ok(row.into())
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, created_at FROM storefront.shop_user WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn cart(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
        // Version first: a cart edited between the two reads then carries a
        // stale version and the checkout commit conflicts instead of clearing
        // lines it never saw.
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT cart_version FROM storefront.shop_user WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(version) = version else {
            return Ok(None);
        };

        let items = load_cart_items(&self.pool, user_id).await?;
        Ok(Some(Cart { items, version }))
    }

    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Cart, StoreError> {
        let mut tx = self.pool.begin().await?;

        let version: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE storefront.shop_user
            SET cart_version = cart_version + 1
            WHERE id = $1
            RETURNING cart_version
            ",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(version) = version else {
            return Err(StoreError::NotFound);
        };

        let upserted = sqlx::query(
            r"
            INSERT INTO storefront.cart_item (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = storefront.cart_item.quantity + EXCLUDED.quantity
            WHERE storefront.cart_item.quantity + EXCLUDED.quantity <= $4
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(i64::from(quantity))
        .bind(i64::from(u32::MAX))
        .execute(&mut *tx)
        .await?;

        // The version bump above rolls back with the dropped transaction.
        if upserted.rows_affected() == 0 {
            return Err(StoreError::QuantityOutOfRange);
        }

        let items = load_cart_items(&mut *tx, user_id).await?;
        tx.commit().await?;

        Ok(Cart { items, version })
    }

    async fn remove_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT cart_version FROM storefront.shop_user WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            return Err(StoreError::NotFound);
        }

        let result = sqlx::query(
            "DELETE FROM storefront.cart_item WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }

        sqlx::query(
            "UPDATE storefront.shop_user SET cart_version = cart_version + 1 WHERE id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn commit_order(&self, commit: &OrderCommit) -> Result<(), StoreError> {
        let order = &commit.order;
        let mut tx = self.pool.begin().await?;

        if let Some(expected) = commit.expected_cart_version {
            let result = sqlx::query(
                r"
                UPDATE storefront.shop_user
                SET cart_version = cart_version + 1
                WHERE id = $1 AND cart_version = $2
                ",
            )
            .bind(order.user_id)
            .bind(expected)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict(format!(
                    "cart changed (expected version {expected})"
                )));
            }

            sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1")
                .bind(order.user_id)
                .execute(&mut *tx)
                .await?;
        } else {
            let exists: Option<i64> = sqlx::query_scalar(
                "SELECT cart_version FROM storefront.shop_user WHERE id = $1 FOR SHARE",
            )
            .bind(order.user_id)
            .fetch_optional(&mut *tx)
            .await?;

            if exists.is_none() {
                return Err(StoreError::NotFound);
            }
        }

        // BTreeMap gives a stable product lock order across concurrent commits.
        let mut demand: BTreeMap<ProductId, i64> = BTreeMap::new();
        for line in &order.lines {
            *demand.entry(line.product_id).or_default() += i64::from(line.quantity);
        }

        for (product_id, wanted) in &demand {
            let result = sqlx::query(
                r"
                UPDATE storefront.product
                SET stock = stock - $1, version = version + 1
                WHERE id = $2 AND stock >= $1
                ",
            )
            .bind(*wanted)
            .bind(*product_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict(format!(
                    "insufficient stock for product {product_id}"
                )));
            }
        }

        sqlx::query(
            r"
            INSERT INTO storefront.shop_order (id, user_id, total, created_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.total)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in order.lines.iter().enumerate() {
            let line_no = i32::try_from(line_no)
                .map_err(|_| StoreError::Conflict("too many order lines".to_owned()))?;
            sqlx::query(
                r"
                INSERT INTO storefront.order_line
                    (order_id, line_no, product_id, name, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(order.id)
            .bind(line_no)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(line.unit_price)
            .bind(i64::from(line.quantity))
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn orders(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        if self.user(user_id).await?.is_none() {
            return Err(StoreError::NotFound);
        }

        let order_rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, total, created_at
            FROM storefront.shop_order
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = order_rows.iter().map(|o| o.id.as_uuid()).collect();
        let line_rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT order_id, product_id, name, unit_price, quantity, line_total
            FROM storefront.order_line
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no
            ",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for row in line_rows {
            lines.entry(row.order_id).or_default().push(OrderLine {
                product_id: row.product_id,
                name: row.name,
                unit_price: row.unit_price,
                quantity: quantity_from_row(row.quantity)?,
                line_total: row.line_total,
            });
        }

        Ok(order_rows
            .into_iter()
            .map(|o| Order {
                lines: lines.remove(&o.id).unwrap_or_default(),
                id: o.id,
                user_id: o.user_id,
                total: o.total,
                created_at: o.created_at,
            })
            .collect())
    }
}
