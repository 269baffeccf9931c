//! The two cross-service event types and their publish helpers.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, ProductId, UserId};
use domain::Order;
use serde::{Deserialize, Serialize};

use crate::bus::EventBus;

/// Topic carrying `OrderCreatedEvent`, keyed by order id.
pub const ORDER_EVENTS_TOPIC: &str = "order-events";

/// Topic carrying `PaymentProcessedEvent`, keyed by order id.
pub const PAYMENT_EVENTS_TOPIC: &str = "payment-events";

/// Snapshot of one order line as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineSnapshot {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price_at_time: Money,
}

/// Published by the orchestrator after the order-creation unit of work
/// commits. Consumed by the payment simulator and the notification
/// collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub user_email: String,
    pub user_first_name: String,
    pub user_last_name: String,
    pub total_price: Money,
    pub items: Vec<OrderLineSnapshot>,
    pub created_at: DateTime<Utc>,
}

impl OrderCreatedEvent {
    /// Builds the event from a freshly committed order.
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            user_id: order.user_id(),
            user_email: order.user_email().to_string(),
            user_first_name: order.user_first_name().to_string(),
            user_last_name: order.user_last_name().to_string(),
            total_price: order.total_price(),
            items: order
                .items()
                .iter()
                .map(|item| OrderLineSnapshot {
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    price_at_time: item.price_at_time,
                })
                .collect(),
            created_at: order.created_at(),
        }
    }
}

/// Outcome of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Success,
    Failed,
}

/// Published by the payment simulator once a payment attempt settles.
/// Consumed by the orchestrator (status convergence / compensation) and
/// the notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProcessedEvent {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total_amount: Money,
    pub status: PaymentStatus,
    /// Human-readable reason, only set on failure.
    pub error_message: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl PaymentProcessedEvent {
    /// Builds a success outcome for the given order event.
    pub fn success(order: &OrderCreatedEvent) -> Self {
        Self {
            payment_id: PaymentId::new(),
            order_id: order.order_id,
            user_id: order.user_id,
            total_amount: order.total_price,
            status: PaymentStatus::Success,
            error_message: None,
            processed_at: Utc::now(),
        }
    }

    /// Builds a failure outcome with a human-readable reason.
    pub fn failure(order: &OrderCreatedEvent, reason: impl Into<String>) -> Self {
        Self {
            payment_id: PaymentId::new(),
            order_id: order.order_id,
            user_id: order.user_id,
            total_amount: order.total_price,
            status: PaymentStatus::Failed,
            error_message: Some(reason.into()),
            processed_at: Utc::now(),
        }
    }
}

/// Publishes an `OrderCreatedEvent`, keyed by order id.
///
/// Publish failure is logged and swallowed: the order and its reservation
/// are already committed and are not rolled back for a lost event. The
/// resulting durability gap is reconciled out of band.
pub async fn publish_order_created<B: EventBus + ?Sized>(bus: &B, event: &OrderCreatedEvent) {
    let key = event.order_id.to_string();
    let payload = match serde_json::to_value(event) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(order_id = %event.order_id, error = %e, "failed to serialize OrderCreated event");
            return;
        }
    };

    match bus.publish(ORDER_EVENTS_TOPIC, &key, payload).await {
        Ok(()) => {
            tracing::info!(order_id = %event.order_id, user_id = %event.user_id, "published OrderCreated event");
        }
        Err(e) => {
            tracing::error!(order_id = %event.order_id, error = %e, "failed to publish OrderCreated event");
        }
    }
}

/// Publishes a `PaymentProcessedEvent`, keyed by order id.
///
/// Same log-and-continue contract as [`publish_order_created`].
pub async fn publish_payment_processed<B: EventBus + ?Sized>(bus: &B, event: &PaymentProcessedEvent) {
    let key = event.order_id.to_string();
    let payload = match serde_json::to_value(event) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(order_id = %event.order_id, error = %e, "failed to serialize PaymentProcessed event");
            return;
        }
    };

    match bus.publish(PAYMENT_EVENTS_TOPIC, &key, payload).await {
        Ok(()) => {
            tracing::info!(
                payment_id = %event.payment_id,
                order_id = %event.order_id,
                status = ?event.status,
                "published PaymentProcessed event"
            );
        }
        Err(e) => {
            tracing::error!(order_id = %event.order_id, error = %e, "failed to publish PaymentProcessed event");
        }
    }
}
