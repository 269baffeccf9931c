//! Order-created consumer that simulates payment processing.

use std::time::Duration;

use events::{
    EventBus, ORDER_EVENTS_TOPIC, OrderCreatedEvent, PaymentProcessedEvent,
    publish_payment_processed,
};
use rand::Rng;

use crate::config::PaymentConfig;

/// Reason attached to every simulated decline.
const DECLINE_REASON: &str = "insufficient funds or card declined";

/// Simulated payment processor.
pub struct PaymentProcessor<B: EventBus> {
    bus: B,
    config: PaymentConfig,
}

impl<B: EventBus> PaymentProcessor<B> {
    /// Creates a new processor over the given bus.
    pub fn new(bus: B, config: PaymentConfig) -> Self {
        Self { bus, config }
    }

    /// Consumes `OrderCreatedEvent`s until the topic closes.
    ///
    /// Malformed records are logged and skipped; they are not re-queued.
    pub async fn run(self) {
        let mut subscription = self.bus.subscribe(ORDER_EVENTS_TOPIC).await;
        tracing::info!("payment simulator consuming {ORDER_EVENTS_TOPIC}");

        while let Some(record) = subscription.next().await {
            match serde_json::from_value::<OrderCreatedEvent>(record.payload) {
                Ok(event) => self.process(event).await,
                Err(e) => {
                    tracing::error!(key = %record.key, error = %e, "skipping malformed OrderCreated event");
                }
            }
        }

        tracing::info!("payment simulator stopped: {ORDER_EVENTS_TOPIC} closed");
    }

    /// Decides one payment and publishes the outcome.
    #[tracing::instrument(skip(self, event), fields(order_id = %event.order_id))]
    pub async fn process(&self, event: OrderCreatedEvent) {
        tracing::debug!(
            user_id = %event.user_id,
            total = %event.total_price,
            "processing payment"
        );

        let delay = self.sample_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let success = {
            let mut rng = rand::thread_rng();
            rng.gen_bool(self.config.success_rate.clamp(0.0, 1.0))
        };

        let outcome = if success {
            PaymentProcessedEvent::success(&event)
        } else {
            PaymentProcessedEvent::failure(&event, DECLINE_REASON)
        };

        let status_label = if success { "success" } else { "failed" };
        metrics::counter!("payments_processed_total", "status" => status_label).increment(1);
        tracing::info!(
            payment_id = %outcome.payment_id,
            status = ?outcome.status,
            "payment processed"
        );

        publish_payment_processed(&self.bus, &outcome).await;
    }

    fn sample_delay(&self) -> Duration {
        let min = self.config.min_delay.as_millis() as u64;
        let max = self.config.max_delay.as_millis() as u64;
        if max <= min {
            return self.config.min_delay;
        }
        let millis = {
            let mut rng = rand::thread_rng();
            rng.gen_range(min..=max)
        };
        Duration::from_millis(millis)
    }
}
