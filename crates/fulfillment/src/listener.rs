//! Payment event consumer.

use std::sync::Arc;

use events::{EventBus, PAYMENT_EVENTS_TOPIC, PaymentProcessedEvent};
use store::FulfillmentStore;

use crate::orchestrator::FulfillmentService;

impl<S, B> FulfillmentService<S, B>
where
    S: FulfillmentStore,
    B: EventBus,
{
    /// Consumes `PaymentProcessedEvent`s until the topic closes.
    ///
    /// Handler errors are logged and the event is not re-queued; the
    /// handlers themselves are idempotent, so transport-level redelivery
    /// (if any) is safe.
    pub async fn run_payment_listener(self: Arc<Self>) {
        let mut subscription = self.bus().subscribe(PAYMENT_EVENTS_TOPIC).await;
        tracing::info!("orchestrator consuming {PAYMENT_EVENTS_TOPIC}");

        while let Some(record) = subscription.next().await {
            let event: PaymentProcessedEvent = match serde_json::from_value(record.payload) {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(key = %record.key, error = %e, "skipping malformed PaymentProcessed event");
                    continue;
                }
            };

            if let Err(e) = self.handle_payment_outcome(&event).await {
                tracing::error!(
                    order_id = %event.order_id,
                    payment_id = %event.payment_id,
                    error = %e,
                    "payment event handling failed"
                );
            }
        }

        tracing::info!("payment listener stopped: {PAYMENT_EVENTS_TOPIC} closed");
    }
}
