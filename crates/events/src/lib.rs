//! Domain events and the bridge that carries them between services.
//!
//! Events are immutable facts published at most once per logical
//! occurrence, but the transport is at-least-once: consumers may see the
//! same event more than once and must be idempotent. All events for one
//! order share the order id as partition key, so a single consumer
//! observes them in send order.

pub mod bus;
pub mod error;
pub mod events;

pub use bus::{BusSubscription, EventBus, InMemoryEventBus, Record};
pub use error::BusError;
pub use events::{
    ORDER_EVENTS_TOPIC, OrderCreatedEvent, OrderLineSnapshot, PAYMENT_EVENTS_TOPIC,
    PaymentProcessedEvent, PaymentStatus, publish_order_created, publish_payment_processed,
};
