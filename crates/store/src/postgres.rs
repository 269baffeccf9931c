use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, OrderId, ProductId, UserId};
use domain::{CartItem, CartLine, Order, OrderItem, OrderStatus, Product, UserIdentity};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::cache::ProductCache;
use crate::error::{Result, StoreError};
use crate::store::{
    CancelOutcome, CartStore, FulfillmentStore, InventoryLedger, OrderStore, ProductStore,
    ReserveRequest, ReservedLine, aggregate_requests,
};

/// Bound on row-lock waits; exceeding it maps to the retryable
/// `StoreError::LockTimeout`.
const LOCK_TIMEOUT_SQL: &str = "SET LOCAL lock_timeout = '5s'";

/// PostgreSQL-backed store.
///
/// Row locks are taken with `SELECT … ORDER BY id FOR UPDATE`, which gives
/// the same globally sorted acquisition order as the in-memory store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    cache: Arc<ProductCache>,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: Arc::new(ProductCache::new()),
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock_quantity: row.try_get::<i32, _>("stock_quantity")? as u32,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: row.try_get("id")?,
            product_id: ProductId::from_uuid(row.try_get("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            price_at_time: Money::from_cents(row.try_get("price_at_time_cents")?),
        })
    }

    fn parse_status(status: &str) -> Result<OrderStatus> {
        status.parse().map_err(|e: String| {
            StoreError::Serialization(serde_json::Error::io(std::io::Error::other(e)))
        })
    }

    fn map_lock_error(e: sqlx::Error) -> StoreError {
        // 55P03: lock_not_available, raised when lock_timeout expires.
        if let sqlx::Error::Database(ref db) = e
            && db.code().as_deref() == Some("55P03")
        {
            return StoreError::LockTimeout;
        }
        StoreError::Database(e)
    }

    /// Locks the product rows in ascending id order, validates every
    /// requested quantity, and decrements stock, all inside the caller's
    /// transaction. Rolls back with the caller on any error.
    async fn reserve_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        wanted: &BTreeMap<ProductId, u32>,
    ) -> Result<Vec<ReservedLine>> {
        let ids: Vec<Uuid> = wanted.keys().map(ProductId::as_uuid).collect();

        let rows = sqlx::query(
            r#"
            SELECT id, name, price_cents, stock_quantity
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut **tx)
        .await
        .map_err(Self::map_lock_error)?;

        if rows.len() != wanted.len() {
            let found: HashSet<Uuid> = rows
                .iter()
                .map(|row| row.try_get::<Uuid, _>("id"))
                .collect::<std::result::Result<_, _>>()?;
            if let Some(missing) = wanted.keys().find(|id| !found.contains(&id.as_uuid())) {
                return Err(StoreError::ProductNotFound(*missing));
            }
        }

        // Rows come back in the same ascending order as `wanted`.
        for (row, (product_id, quantity)) in rows.iter().zip(wanted.iter()) {
            let available = row.try_get::<i32, _>("stock_quantity")? as u32;
            if available < *quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: *product_id,
                    requested: *quantity,
                    available,
                });
            }
        }

        let mut lines = Vec::with_capacity(rows.len());
        for (row, (product_id, quantity)) in rows.iter().zip(wanted.iter()) {
            sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = $3 WHERE id = $1",
            )
            .bind(product_id.as_uuid())
            .bind(*quantity as i32)
            .bind(Utc::now())
            .execute(&mut **tx)
            .await?;

            lines.push(ReservedLine {
                product_id: *product_id,
                product_name: row.try_get("name")?,
                quantity: *quantity,
                unit_price: Money::from_cents(row.try_get("price_cents")?),
            });
        }

        Ok(lines)
    }

    async fn items_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
    ) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, product_name, quantity, price_at_time_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY product_id
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut **tx)
        .await?;

        rows.iter().map(Self::row_to_item).collect()
    }

    fn order_from_rows(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
        Ok(Order::from_parts(
            OrderId::from_uuid(row.try_get("id")?),
            UserId::from_uuid(row.try_get("user_id")?),
            row.try_get("user_first_name")?,
            row.try_get("user_last_name")?,
            row.try_get("user_email")?,
            items,
            Money::from_cents(row.try_get("total_price_cents")?),
            Self::parse_status(row.try_get("status")?)?,
            row.try_get("created_at")?,
        ))
    }

    async fn insert_order_in_tx(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, user_first_name, user_last_name, user_email,
                                total_price_cents, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(order.user_first_name())
        .bind(order.user_last_name())
        .bind(order.user_email())
        .bind(order.total_price().cents())
        .bind(order.status().as_str())
        .bind(order.created_at())
        .execute(&mut **tx)
        .await?;

        for item in order.items() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_name, quantity,
                                         price_at_time_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id)
            .bind(order.id().as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(item.quantity as i32)
            .bind(item.price_at_time.cents())
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl InventoryLedger for PostgresStore {
    async fn reserve_all(&self, items: &[ReserveRequest]) -> Result<Vec<ReservedLine>> {
        let wanted = aggregate_requests(items);

        let mut tx = self.pool.begin().await?;
        sqlx::query(LOCK_TIMEOUT_SQL).execute(&mut *tx).await?;
        let lines = Self::reserve_in_tx(&mut tx, &wanted).await?;
        tx.commit().await?;

        self.cache.invalidate(wanted.keys().copied());
        tracing::debug!(products = lines.len(), "reserved stock");
        Ok(lines)
    }

    async fn release_all(&self, items: &[ReserveRequest]) -> Result<()> {
        let wanted = aggregate_requests(items);
        let ids: Vec<Uuid> = wanted.keys().map(ProductId::as_uuid).collect();

        let mut tx = self.pool.begin().await?;
        sqlx::query(LOCK_TIMEOUT_SQL).execute(&mut *tx).await?;

        // Same ordered locking discipline as reservation.
        sqlx::query("SELECT id FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await
            .map_err(Self::map_lock_error)?;

        for (product_id, quantity) in &wanted {
            sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = $3 WHERE id = $1",
            )
            .bind(product_id.as_uuid())
            .bind(*quantity as i32)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.cache.invalidate(wanted.keys().copied());
        tracing::debug!(products = wanted.len(), "released stock");
        Ok(())
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn cart_snapshot(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT c.product_id, c.quantity, p.name, p.price_cents
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.product_id
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CartLine {
                    product_id: ProductId::from_uuid(row.try_get("product_id")?),
                    product_name: row.try_get("name")?,
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                    unit_price: Money::from_cents(row.try_get("price_cents")?),
                })
            })
            .collect()
    }

    async fn upsert_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            RETURNING quantity
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(quantity as i32)
        .fetch_one(&self.pool)
        .await?;

        Ok(CartItem {
            user_id,
            product_id,
            quantity: row.try_get::<i32, _>("quantity")? as u32,
        })
    }

    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<usize> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn insert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, stock_quantity, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.stock_quantity as i32)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        self.cache.invalidate([product.id]);
        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        if let Some(product) = self.cache.get(product_id) {
            return Ok(Some(product));
        }

        let row = sqlx::query(
            "SELECT id, name, description, price_cents, stock_quantity, updated_at FROM products WHERE id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let product = Self::row_to_product(&row)?;
                self.cache.put(product.clone());
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        if let Some(listing) = self.cache.listing() {
            return Ok(listing);
        }

        let rows = sqlx::query(
            "SELECT id, name, description, price_cents, stock_quantity, updated_at FROM products ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let listing: Vec<Product> = rows
            .iter()
            .map(Self::row_to_product)
            .collect::<Result<_>>()?;
        self.cache.put_listing(listing.clone());
        Ok(listing)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let items = Self::items_in_tx(&mut tx, order_id).await?;
        tx.commit().await?;

        Ok(Some(Self::order_from_rows(&row, items)?))
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let order_id = OrderId::from_uuid(row.try_get("id")?);
            let items = Self::items_in_tx(&mut tx, order_id).await?;
            orders.push(Self::order_from_rows(row, items)?);
        }
        tx.commit().await?;

        Ok(orders)
    }

    async fn transition_order(&self, order_id: OrderId, target: OrderStatus) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(LOCK_TIMEOUT_SQL).execute(&mut *tx).await?;

        let row = sqlx::query("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(Self::map_lock_error)?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        let items = Self::items_in_tx(&mut tx, order_id).await?;
        let mut order = Self::order_from_rows(&row, items)?;
        order.transition(target)?;

        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(order.status().as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(order)
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<CancelOutcome> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(LOCK_TIMEOUT_SQL).execute(&mut *tx).await?;

        let row = sqlx::query("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(Self::map_lock_error)?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if Self::parse_status(row.try_get("status")?)? == OrderStatus::Cancelled {
            return Ok(CancelOutcome::AlreadyCancelled);
        }

        let items = Self::items_in_tx(&mut tx, order_id).await?;
        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(OrderStatus::Cancelled.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(CancelOutcome::Cancelled(
            items
                .iter()
                .map(|item| ReserveRequest::new(item.product_id, item.quantity))
                .collect(),
        ))
    }
}

#[async_trait]
impl FulfillmentStore for PostgresStore {
    async fn create_order(&self, user: &UserIdentity, lines: &[CartLine]) -> Result<Order> {
        let requests: Vec<ReserveRequest> = lines
            .iter()
            .map(|line| ReserveRequest::new(line.product_id, line.quantity))
            .collect();
        let wanted = aggregate_requests(&requests);

        // One atomic unit: reservation, order row, line items, cart clear.
        let mut tx = self.pool.begin().await?;
        sqlx::query(LOCK_TIMEOUT_SQL).execute(&mut *tx).await?;

        let reserved = Self::reserve_in_tx(&mut tx, &wanted).await?;
        let items: Vec<OrderItem> = reserved
            .into_iter()
            .map(|line| {
                OrderItem::new(
                    line.product_id,
                    line.product_name,
                    line.quantity,
                    line.unit_price,
                )
            })
            .collect();
        let order = Order::new(user, items);

        Self::insert_order_in_tx(&mut tx, &order).await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user.id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.cache.invalidate(wanted.keys().copied());
        Ok(order)
    }
}
