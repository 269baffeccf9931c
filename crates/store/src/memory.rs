//! In-memory store implementation.
//!
//! Backs the same traits as the PostgreSQL implementation and keeps the
//! same locking discipline: one mutex per product row, acquired in
//! ascending product-id order. Used for tests and for running the pipeline
//! without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, UserId};
use domain::{CartItem, CartLine, Order, OrderItem, OrderStatus, Product, UserIdentity};
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;

use crate::cache::ProductCache;
use crate::error::{Result, StoreError};
use crate::store::{
    CancelOutcome, CartStore, FulfillmentStore, InventoryLedger, OrderStore, ProductStore,
    ReserveRequest, ReservedLine, aggregate_requests,
};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

type ProductRow = Arc<Mutex<Product>>;
type OrderRow = Arc<Mutex<Order>>;

/// In-memory store with per-row locking.
#[derive(Clone)]
pub struct MemoryStore {
    products: Arc<RwLock<BTreeMap<ProductId, ProductRow>>>,
    carts: Arc<RwLock<HashMap<UserId, BTreeMap<ProductId, u32>>>>,
    orders: Arc<RwLock<HashMap<OrderId, OrderRow>>>,
    cache: Arc<ProductCache>,
    lock_timeout: Duration,
}

impl MemoryStore {
    /// Creates an empty store with the default lock timeout.
    pub fn new() -> Self {
        Self {
            products: Arc::new(RwLock::new(BTreeMap::new())),
            carts: Arc::new(RwLock::new(HashMap::new())),
            orders: Arc::new(RwLock::new(HashMap::new())),
            cache: Arc::new(ProductCache::new()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Overrides the row-lock acquisition bound.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Collects the row handles for the given product ids, ascending.
    ///
    /// A missing id is a business error reported before any lock is taken.
    async fn rows_for(
        &self,
        wanted: &BTreeMap<ProductId, u32>,
    ) -> Result<Vec<(ProductId, ProductRow)>> {
        let products = self.products.read().await;
        let mut rows = Vec::with_capacity(wanted.len());
        for product_id in wanted.keys() {
            let row = products
                .get(product_id)
                .cloned()
                .ok_or(StoreError::ProductNotFound(*product_id))?;
            rows.push((*product_id, row));
        }
        Ok(rows)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryLedger for MemoryStore {
    async fn reserve_all(&self, items: &[ReserveRequest]) -> Result<Vec<ReservedLine>> {
        let wanted = aggregate_requests(items);
        let rows = self.rows_for(&wanted).await?;

        // Single pass in ascending id order; no quantity is read until
        // every lock is held.
        let mut guards = Vec::with_capacity(rows.len());
        for (_, row) in &rows {
            let guard = timeout(self.lock_timeout, row.lock())
                .await
                .map_err(|_| StoreError::LockTimeout)?;
            guards.push(guard);
        }

        // All-or-nothing validation: the first shortfall aborts before any
        // stock changes.
        for (guard, (product_id, quantity)) in guards.iter().zip(wanted.iter()) {
            if guard.stock_quantity < *quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: *product_id,
                    requested: *quantity,
                    available: guard.stock_quantity,
                });
            }
        }

        let mut lines = Vec::with_capacity(guards.len());
        for (guard, (product_id, quantity)) in guards.iter_mut().zip(wanted.iter()) {
            guard.stock_quantity -= *quantity;
            guard.updated_at = Utc::now();
            lines.push(ReservedLine {
                product_id: *product_id,
                product_name: guard.name.clone(),
                quantity: *quantity,
                unit_price: guard.price,
            });
        }
        drop(guards);

        self.cache.invalidate(wanted.keys().copied());
        tracing::debug!(products = lines.len(), "reserved stock");
        Ok(lines)
    }

    async fn release_all(&self, items: &[ReserveRequest]) -> Result<()> {
        let wanted = aggregate_requests(items);
        let rows = self.rows_for(&wanted).await?;

        let mut guards = Vec::with_capacity(rows.len());
        for (_, row) in &rows {
            // Release must not fail once cancellation has won the CAS, so
            // it waits out the (ordered, hence finite) lock queue.
            guards.push(row.lock().await);
        }

        for (guard, (_, quantity)) in guards.iter_mut().zip(wanted.iter()) {
            guard.stock_quantity += *quantity;
            guard.updated_at = Utc::now();
        }
        drop(guards);

        self.cache.invalidate(wanted.keys().copied());
        tracing::debug!(products = wanted.len(), "released stock");
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart_snapshot(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let carts = self.carts.read().await;
        let Some(cart) = carts.get(&user_id) else {
            return Ok(Vec::new());
        };

        let products = self.products.read().await;
        let mut lines = Vec::with_capacity(cart.len());
        for (product_id, quantity) in cart {
            let Some(row) = products.get(product_id) else {
                continue;
            };
            let product = row.lock().await;
            lines.push(CartLine {
                product_id: *product_id,
                product_name: product.name.clone(),
                quantity: *quantity,
                unit_price: product.price,
            });
        }
        Ok(lines)
    }

    async fn upsert_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem> {
        let mut carts = self.carts.write().await;
        let entry = carts
            .entry(user_id)
            .or_default()
            .entry(product_id)
            .or_insert(0);
        *entry += quantity;
        Ok(CartItem {
            user_id,
            product_id,
            quantity: *entry,
        })
    }

    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        let mut carts = self.carts.write().await;
        if let Some(cart) = carts.get_mut(&user_id) {
            cart.remove(&product_id);
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<usize> {
        let mut carts = self.carts.write().await;
        Ok(carts.remove(&user_id).map_or(0, |cart| cart.len()))
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn insert_product(&self, product: Product) -> Result<()> {
        let product_id = product.id;
        let mut products = self.products.write().await;
        products.insert(product_id, Arc::new(Mutex::new(product)));
        drop(products);
        self.cache.invalidate([product_id]);
        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        if let Some(product) = self.cache.get(product_id) {
            return Ok(Some(product));
        }

        let products = self.products.read().await;
        let Some(row) = products.get(&product_id) else {
            return Ok(None);
        };
        let product = row.lock().await.clone();
        drop(products);

        self.cache.put(product.clone());
        Ok(Some(product))
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        if let Some(listing) = self.cache.listing() {
            return Ok(listing);
        }

        let products = self.products.read().await;
        let mut listing = Vec::with_capacity(products.len());
        for row in products.values() {
            listing.push(row.lock().await.clone());
        }
        drop(products);

        self.cache.put_listing(listing.clone());
        Ok(listing)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        let Some(row) = orders.get(&order_id) else {
            return Ok(None);
        };
        Ok(Some(row.lock().await.clone()))
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut result = Vec::new();
        for row in orders.values() {
            let order = row.lock().await;
            if order.user_id() == user_id {
                result.push(order.clone());
            }
        }
        drop(orders);
        result.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(result)
    }

    async fn transition_order(&self, order_id: OrderId, target: OrderStatus) -> Result<Order> {
        let orders = self.orders.read().await;
        let row = orders
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::OrderNotFound(order_id))?;
        drop(orders);

        let mut order = row.lock().await;
        order.transition(target)?;
        Ok(order.clone())
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<CancelOutcome> {
        let orders = self.orders.read().await;
        let row = orders
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::OrderNotFound(order_id))?;
        drop(orders);

        let mut order = row.lock().await;
        if !order.cancel() {
            return Ok(CancelOutcome::AlreadyCancelled);
        }
        let lines = order
            .items()
            .iter()
            .map(|item| ReserveRequest::new(item.product_id, item.quantity))
            .collect();
        Ok(CancelOutcome::Cancelled(lines))
    }
}

#[async_trait]
impl FulfillmentStore for MemoryStore {
    async fn create_order(&self, user: &UserIdentity, lines: &[CartLine]) -> Result<Order> {
        let requests: Vec<ReserveRequest> = lines
            .iter()
            .map(|line| ReserveRequest::new(line.product_id, line.quantity))
            .collect();

        let reserved = self.reserve_all(&requests).await?;

        // Reservation was the only fallible step; the remaining writes
        // cannot abort, so the unit commits as a whole.
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

        let mut orders = self.orders.write().await;
        orders.insert(order.id(), Arc::new(Mutex::new(order.clone())));
        drop(orders);

        self.clear_cart(user.id).await?;
        Ok(order)
    }
}
