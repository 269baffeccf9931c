//! The order fulfillment orchestrator.

use common::{OrderId, UserId};
use domain::{Order, OrderError, OrderStatus, UserIdentity};
use events::{EventBus, OrderCreatedEvent, PaymentProcessedEvent, PaymentStatus, publish_order_created};
use store::{CancelOutcome, FulfillmentStore, StoreError};

use crate::error::FulfillmentError;

/// Bounded number of checkout attempts when the store reports a
/// retryable infrastructure failure. Business errors are never retried.
const CREATE_ORDER_ATTEMPTS: u32 = 3;

/// Drives checkout and payment convergence over a store and an event bus.
pub struct FulfillmentService<S, B> {
    store: S,
    bus: B,
}

impl<S, B> FulfillmentService<S, B>
where
    S: FulfillmentStore,
    B: EventBus,
{
    /// Creates a new orchestrator.
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the underlying event bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Converts the user's cart into an order.
    ///
    /// Reads the cart snapshot, reserves inventory, persists the order in
    /// `Reserved` with lock-time prices, and clears the cart, all as one
    /// unit of work. `OrderCreatedEvent` is published only after that unit
    /// commits; a publish failure is logged and does not roll anything
    /// back.
    #[tracing::instrument(skip(self, identity), fields(user_id = %user_id))]
    pub async fn create_order_from_cart(
        &self,
        user_id: UserId,
        identity: &UserIdentity,
    ) -> Result<Order, FulfillmentError> {
        let checkout_start = std::time::Instant::now();

        if user_id != identity.id {
            return Err(FulfillmentError::IdentityMismatch {
                user_id,
                identity_id: identity.id,
            });
        }

        let lines = self.store.cart_snapshot(user_id).await?;
        if lines.is_empty() {
            return Err(FulfillmentError::EmptyCart(user_id));
        }

        let mut attempt = 0;
        let order = loop {
            attempt += 1;
            match self.store.create_order(identity, &lines).await {
                Ok(order) => break order,
                Err(e) if e.is_retryable() && attempt < CREATE_ORDER_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, "checkout hit a retryable failure, retrying");
                }
                Err(e) => {
                    metrics::counter!("reservation_failures_total").increment(1);
                    return Err(e.into());
                }
            }
        };

        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("checkout_duration_seconds")
            .record(checkout_start.elapsed().as_secs_f64());
        tracing::info!(
            order_id = %order.id(),
            total = %order.total_price(),
            items = order.items().len(),
            "order created from cart"
        );

        publish_order_created(&self.bus, &OrderCreatedEvent::for_order(&order)).await;
        Ok(order)
    }

    /// Applies one payment outcome to its order.
    ///
    /// Safe to invoke more than once for the same logical event: a
    /// redelivered success fails the forward-only guard harmlessly, and a
    /// redelivered failure finds the order already cancelled.
    #[tracing::instrument(skip(self, event), fields(order_id = %event.order_id, status = ?event.status))]
    pub async fn handle_payment_outcome(
        &self,
        event: &PaymentProcessedEvent,
    ) -> Result<(), FulfillmentError> {
        match event.status {
            PaymentStatus::Success => self.advance_after_payment(event).await,
            PaymentStatus::Failed => self.compensate(event).await,
        }
    }

    async fn advance_after_payment(
        &self,
        event: &PaymentProcessedEvent,
    ) -> Result<(), FulfillmentError> {
        let Some(order) = self.store.get_order(event.order_id).await? else {
            tracing::warn!(payment_id = %event.payment_id, "payment outcome for unknown order, ignoring");
            return Ok(());
        };
        if order.user_id() != event.user_id {
            tracing::warn!(
                payment_id = %event.payment_id,
                event_user = %event.user_id,
                order_user = %order.user_id(),
                "payment outcome user mismatch, ignoring"
            );
            return Ok(());
        }

        match self
            .store
            .transition_order(event.order_id, OrderStatus::PaymentProcessed)
            .await
        {
            Ok(order) => {
                tracing::info!(status = %order.status(), "payment applied to order");
                Ok(())
            }
            Err(StoreError::Order(e)) => {
                // Redelivery or an out-of-order event; the guard already
                // protected the order.
                tracing::warn!(error = %e, "payment outcome rejected by status guard, ignoring");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The compensation path: release reserved inventory and cancel.
    ///
    /// The cancellation compare-and-set runs first, so inventory is
    /// released exactly once no matter how often the failure event is
    /// delivered.
    async fn compensate(&self, event: &PaymentProcessedEvent) -> Result<(), FulfillmentError> {
        tracing::warn!(
            payment_id = %event.payment_id,
            reason = event.error_message.as_deref().unwrap_or(""),
            "payment failed, compensating order"
        );

        match self.store.cancel_order(event.order_id).await {
            Ok(CancelOutcome::Cancelled(lines)) => {
                self.store.release_all(&lines).await?;
                metrics::counter!("orders_cancelled_total").increment(1);
                tracing::info!(released_lines = lines.len(), "order cancelled, inventory released");
                Ok(())
            }
            Ok(CancelOutcome::AlreadyCancelled) => {
                tracing::debug!("order already cancelled, no-op");
                Ok(())
            }
            Err(StoreError::OrderNotFound(_)) => {
                tracing::warn!(payment_id = %event.payment_id, "payment failure for unknown order, ignoring");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Applies a status change requested by another service (e.g. marking
    /// an order `Confirmed` or `Completed`).
    ///
    /// Re-validates ownership and the forward-only guard; never touches
    /// inventory.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        user_id: UserId,
        current_status: OrderStatus,
        new_status: OrderStatus,
    ) -> Result<Order, FulfillmentError> {
        if !current_status.can_advance_to(new_status) {
            return Err(OrderError::InvalidTransition {
                current: current_status,
                target: new_status,
            }
            .into());
        }

        // Ownership check before touching anything; foreign orders look
        // exactly like missing ones to the caller.
        self.order_details(order_id, user_id).await?;

        let order = self.store.transition_order(order_id, new_status).await?;
        tracing::info!(status = %order.status(), "order status updated externally");
        Ok(order)
    }

    /// Loads one order, hiding other users' orders behind `OrderNotFound`.
    pub async fn order_details(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Order, FulfillmentError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;
        if order.user_id() != user_id {
            return Err(FulfillmentError::OrderNotFound(order_id));
        }
        Ok(order)
    }

    /// Returns the user's orders, newest first.
    pub async fn orders_history(&self, user_id: UserId) -> Result<Vec<Order>, FulfillmentError> {
        Ok(self.store.orders_for_user(user_id).await?)
    }
}
