//! Storage traits for the fulfillment pipeline.
//!
//! The traits mirror the service boundaries: the inventory ledger is the
//! sole admission point for stock mutations, the cart and order stores are
//! plain row access, and [`FulfillmentStore`] adds the order-creation unit
//! of work that spans all three.

use std::collections::BTreeMap;

use async_trait::async_trait;
use common::{Money, OrderId, ProductId, UserId};
use domain::{CartItem, CartLine, Order, OrderStatus, Product, UserIdentity};

use crate::error::Result;

/// A quantity of one product to reserve or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveRequest {
    /// The product to reserve.
    pub product_id: ProductId,
    /// Units requested.
    pub quantity: u32,
}

impl ReserveRequest {
    /// Creates a new reserve request.
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A committed reservation line.
///
/// `unit_price` is the product price observed while the row lock was held,
/// which is what order line items capture as `price_at_time`.
#[derive(Debug, Clone)]
pub struct ReservedLine {
    /// The reserved product.
    pub product_id: ProductId,
    /// Product name at lock time.
    pub product_name: String,
    /// Units reserved.
    pub quantity: u32,
    /// Unit price at lock time.
    pub unit_price: Money,
}

/// Outcome of an order cancellation attempt.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    /// The order was moved to `Cancelled`; these lines must be released.
    Cancelled(Vec<ReserveRequest>),
    /// The order was already cancelled; nothing to do.
    AlreadyCancelled,
}

/// Merges duplicate product ids and sorts ascending.
///
/// The returned map's iteration order is the global lock-acquisition order
/// shared by every reservation and release.
pub(crate) fn aggregate_requests(items: &[ReserveRequest]) -> BTreeMap<ProductId, u32> {
    let mut wanted: BTreeMap<ProductId, u32> = BTreeMap::new();
    for item in items {
        *wanted.entry(item.product_id).or_insert(0) += item.quantity;
    }
    wanted
}

/// Atomic reserve/release operations over product stock.
///
/// Implementations must acquire exclusive row locks on the distinct product
/// ids in ascending order, in a single pass, before reading any quantity.
/// Two concurrent reservations over overlapping product sets then cannot
/// form a wait cycle.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Reserves stock for every item or for none.
    ///
    /// On success every product's stock is decremented and the captured
    /// lock-time prices are returned, in ascending product-id order. If any
    /// item fails validation the whole reservation aborts with
    /// `InsufficientStock` for the first failing product and no stock
    /// changes.
    async fn reserve_all(&self, items: &[ReserveRequest]) -> Result<Vec<ReservedLine>>;

    /// Returns previously reserved stock, using the same ordered locking
    /// discipline.
    ///
    /// Release is compensation: the caller guarantees it runs at most once
    /// per order (gated by the order's cancellation CAS).
    async fn release_all(&self, items: &[ReserveRequest]) -> Result<()>;
}

/// Cart row access.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Reads the user's cart joined with product data. Pure read, no row
    /// locks; an empty result is a valid outcome.
    async fn cart_snapshot(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Adds quantity to the `(user, product)` cart entry, creating it if
    /// absent. Returns the resulting entry.
    async fn upsert_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem>;

    /// Removes one product from the user's cart.
    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> Result<()>;

    /// Deletes all cart entries for the user, returning how many rows went.
    async fn clear_cart(&self, user_id: UserId) -> Result<usize>;
}

/// Product catalog access.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Inserts a new product.
    async fn insert_product(&self, product: Product) -> Result<()>;

    /// Loads a product by id, served through the read cache.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Lists all products, served through the read cache.
    async fn list_products(&self) -> Result<Vec<Product>>;
}

/// Order row access.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Loads an order by id.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Returns the user's orders, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Applies the forward-only transition guard to the stored order while
    /// holding its row lock, so concurrent transitions on one order
    /// serialize. Fails with `OrderError::InvalidTransition` through
    /// `StoreError::Order` when the guard rejects.
    async fn transition_order(&self, order_id: OrderId, target: OrderStatus) -> Result<Order>;

    /// Atomically moves the order to `Cancelled`.
    ///
    /// Exactly one caller observes `Cancelled` with the lines to release;
    /// every later caller gets `AlreadyCancelled`. This compare-and-set is
    /// what makes redelivered payment-failure events harmless.
    async fn cancel_order(&self, order_id: OrderId) -> Result<CancelOutcome>;
}

/// The full storage surface plus the order-creation unit of work.
#[async_trait]
pub trait FulfillmentStore: InventoryLedger + CartStore + ProductStore + OrderStore {
    /// Runs the checkout unit of work: reserve stock for the given cart
    /// lines, persist a new order in `Reserved` with lock-time prices, and
    /// clear the user's cart. All-or-nothing; on any failure no order
    /// exists and no stock has changed.
    async fn create_order(&self, user: &UserIdentity, lines: &[CartLine]) -> Result<Order>;
}
