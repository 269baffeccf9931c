//! Order aggregate and its state machine.

mod status;

pub use status::OrderStatus;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OrderError;
use crate::identity::UserIdentity;

/// A line item on an order.
///
/// `price_at_time` is the unit price observed while the product row was
/// locked for reservation. It is deliberately decoupled from the live
/// product price so historical orders are immune to future price changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// Line item identifier.
    pub id: Uuid,

    /// The product this line refers to.
    pub product_id: ProductId,

    /// Product name captured at order time.
    pub product_name: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Unit price captured at reservation time.
    pub price_at_time: Money,
}

impl OrderItem {
    /// Creates a new line item with a fresh identifier.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        price_at_time: Money,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            product_name: product_name.into(),
            quantity,
            price_at_time,
        }
    }

    /// Returns the total price for this line (quantity × price at time).
    pub fn total_price(&self) -> Money {
        self.price_at_time.multiply(self.quantity)
    }
}

/// Order aggregate root.
///
/// An order is materialized only once its inventory has been committed, so
/// construction starts in [`OrderStatus::Reserved`]. Line items and the
/// captured user contact fields are immutable after creation; the status is
/// the only field that changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    user_first_name: String,
    user_last_name: String,
    user_email: String,
    items: Vec<OrderItem>,
    total_price: Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Creates an order for the given user with inventory already committed.
    ///
    /// The total is computed here, once, from the captured line prices and
    /// is never recomputed from live product rows.
    pub fn new(user: &UserIdentity, items: Vec<OrderItem>) -> Self {
        let total_price = items.iter().map(OrderItem::total_price).sum();
        Self {
            id: OrderId::new(),
            user_id: user.id,
            user_first_name: user.first_name.clone(),
            user_last_name: user.last_name.clone(),
            user_email: user.email.clone(),
            items,
            total_price,
            status: OrderStatus::Reserved,
            created_at: Utc::now(),
        }
    }

    /// Rehydrates an order from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: OrderId,
        user_id: UserId,
        user_first_name: String,
        user_last_name: String,
        user_email: String,
        items: Vec<OrderItem>,
        total_price: Money,
        status: OrderStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            user_first_name,
            user_last_name,
            user_email,
            items,
            total_price,
            status,
            created_at,
        }
    }

    /// Returns the order identifier.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the owning user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the user's first name as captured at creation.
    pub fn user_first_name(&self) -> &str {
        &self.user_first_name
    }

    /// Returns the user's last name as captured at creation.
    pub fn user_last_name(&self) -> &str {
        &self.user_last_name
    }

    /// Returns the user's email as captured at creation.
    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    /// Returns the line items.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the order total.
    pub fn total_price(&self) -> Money {
        self.total_price
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies the generic forward-only transition guard.
    ///
    /// Succeeds iff `target` is strictly later than the current status in
    /// the fixed sequence; cancellation goes through [`Order::cancel`]
    /// instead.
    pub fn transition(&mut self, target: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_advance_to(target) {
            return Err(OrderError::InvalidTransition {
                current: self.status,
                target,
            });
        }
        self.status = target;
        Ok(())
    }

    /// Moves the order to `Cancelled` from any status.
    ///
    /// Returns true if the status changed, false if the order was already
    /// cancelled (idempotent no-op).
    pub fn cancel(&mut self) -> bool {
        if self.status == OrderStatus::Cancelled {
            return false;
        }
        self.status = OrderStatus::Cancelled;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> UserIdentity {
        UserIdentity {
            id: UserId::new(),
            email: "jane@example.com".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
        }
    }

    fn two_line_order() -> Order {
        Order::new(
            &identity(),
            vec![
                OrderItem::new(ProductId::new(), "Beans", 2, Money::from_cents(1000)),
                OrderItem::new(ProductId::new(), "Filter", 1, Money::from_cents(500)),
            ],
        )
    }

    #[test]
    fn new_order_starts_reserved_with_computed_total() {
        let order = two_line_order();
        assert_eq!(order.status(), OrderStatus::Reserved);
        assert_eq!(order.total_price().cents(), 2500);
        assert_eq!(order.items().len(), 2);
    }

    #[test]
    fn total_uses_captured_prices_not_live_ones() {
        let item = OrderItem::new(ProductId::new(), "Beans", 3, Money::from_cents(999));
        assert_eq!(item.total_price().cents(), 2997);
    }

    #[test]
    fn forward_transition_advances_status() {
        let mut order = two_line_order();
        order.transition(OrderStatus::PaymentProcessed).unwrap();
        assert_eq!(order.status(), OrderStatus::PaymentProcessed);
        order.transition(OrderStatus::Completed).unwrap();
        assert!(order.is_terminal());
    }

    #[test]
    fn backward_transition_is_rejected() {
        let mut order = two_line_order();
        order.transition(OrderStatus::Confirmed).unwrap();

        let result = order.transition(OrderStatus::Reserved);
        assert_eq!(
            result,
            Err(OrderError::InvalidTransition {
                current: OrderStatus::Confirmed,
                target: OrderStatus::Reserved,
            })
        );
        assert_eq!(order.status(), OrderStatus::Confirmed);
    }

    #[test]
    fn same_status_transition_is_rejected() {
        let mut order = two_line_order();
        assert!(order.transition(OrderStatus::Reserved).is_err());
    }

    #[test]
    fn cancel_works_from_any_status_and_is_idempotent() {
        let mut order = two_line_order();
        order.transition(OrderStatus::PaymentProcessed).unwrap();

        assert!(order.cancel());
        assert_eq!(order.status(), OrderStatus::Cancelled);

        // Second cancel is a no-op.
        assert!(!order.cancel());
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn cancelled_order_rejects_forward_transitions() {
        let mut order = two_line_order();
        order.cancel();
        assert!(order.transition(OrderStatus::Completed).is_err());
    }

    #[test]
    fn contact_fields_are_captured_at_creation() {
        let user = identity();
        let order = Order::new(
            &user,
            vec![OrderItem::new(
                ProductId::new(),
                "Beans",
                1,
                Money::from_cents(100),
            )],
        );
        assert_eq!(order.user_id(), user.id);
        assert_eq!(order.user_email(), "jane@example.com");
        assert_eq!(order.user_first_name(), "Jane");
        assert_eq!(order.user_last_name(), "Doe");
    }

    #[test]
    fn serialization_roundtrip() {
        let order = two_line_order();
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), order.id());
        assert_eq!(back.total_price(), order.total_price());
        assert_eq!(back.status(), order.status());
    }
}
