//! Event bus trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::error::BusError;

/// Per-topic buffer before slow consumers start lagging.
const CHANNEL_CAPACITY: usize = 256;

/// One record on a topic: a partition key plus a serialized payload.
#[derive(Debug, Clone)]
pub struct Record {
    /// Partition/routing key; all records for one order share it.
    pub key: String,
    /// Serialized event payload.
    pub payload: Value,
}

/// At-least-once publish/subscribe transport for domain events.
///
/// Records with the same key are observed in send order by any single
/// subscriber. Per-event idempotency is the consumer's responsibility.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes a record to the topic.
    async fn publish(&self, topic: &str, key: &str, payload: Value) -> Result<(), BusError>;

    /// Subscribes to a topic, receiving records published from now on.
    async fn subscribe(&self, topic: &str) -> BusSubscription;
}

/// A live subscription to one topic.
pub struct BusSubscription {
    topic: String,
    rx: broadcast::Receiver<Record>,
}

impl BusSubscription {
    /// Waits for the next record.
    ///
    /// A lagging consumer skips the overwritten records (logged; transport
    /// redelivery is out of scope). Returns `None` once the topic is
    /// closed.
    pub async fn next(&mut self) -> Option<Record> {
        loop {
            match self.rx.recv().await {
                Ok(record) => return Some(record),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "consumer lagged, records dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process event bus backed by one broadcast channel per topic.
///
/// Stands in for the external broker: delivery is in publish order per
/// topic and every subscriber group member sees every record.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Record>>>>,
}

impl InMemoryEventBus {
    /// Creates a new bus with no topics.
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<Record> {
        let mut topics = self.topics.lock().unwrap();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, key: &str, payload: Value) -> Result<(), BusError> {
        let sender = self.sender_for(topic);
        // A send with no live subscribers is not a failure; the record is
        // simply not retained.
        if sender
            .send(Record {
                key: key.to_string(),
                payload,
            })
            .is_err()
        {
            tracing::debug!(topic, key, "no subscribers on topic, record dropped");
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BusSubscription {
        BusSubscription {
            topic: topic.to_string(),
            rx: self.sender_for(topic).subscribe(),
        }
    }
}
