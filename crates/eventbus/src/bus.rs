use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::envelope::Envelope;

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("topic {0} has no subscribers")]
    NoSubscribers(String),

    #[error("consumer channel closed")]
    ChannelClosed,
}

/// A message handed to a consumer, still awaiting acknowledgement.
///
/// Handlers must ack only after every durable side effect of
/// processing the message has succeeded (spec §4.4). This in-memory bus
/// does not persist unacked deliveries across process restarts — a
/// crashed consumer relies on its own upstream redelivery, same as a
/// real broker's visibility timeout would provide.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub envelope: Envelope,
    pub partition_key: String,
}

struct ConsumerGroup {
    senders: Vec<mpsc::UnboundedSender<Delivery>>,
    receivers: Vec<Arc<Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>>>,
}

struct Topic {
    num_partitions: usize,
    groups: HashMap<String, ConsumerGroup>,
}

impl Topic {
    fn new(num_partitions: usize) -> Self {
        Self { num_partitions, groups: HashMap::new() }
    }
}

/// In-memory, partitioned, multi-consumer-group event bus.
///
/// Publication is keyed: messages sharing a key land on the same
/// partition and are delivered to a given consumer group in the order
/// they were published, matching the spec's per-`execution_id`
/// ordering guarantee (§4.4, §4.7) when callers key by `execution_id`.
/// Independent consumer groups (dispatchers vs. workers) each receive
/// their own copy of every message.
pub struct EventBus {
    topics: Mutex<HashMap<String, Topic>>,
    default_partitions: usize,
}

impl EventBus {
    pub fn new(default_partitions: usize) -> Self {
        Self { topics: Mutex::new(HashMap::new()), default_partitions: default_partitions.max(1) }
    }

    /// Registers a consumer group on `topic`, returning one [`Consumer`]
    /// per partition. Subscribing twice under the same group name
    /// returns the existing partitions rather than creating new ones.
    pub fn subscribe(&self, topic: &str, group: &str) -> Vec<Consumer> {
        let mut topics = self.topics.lock();
        let entry = topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(self.default_partitions));

        let group_entry = entry.groups.entry(group.to_string()).or_insert_with(|| {
            let mut senders = Vec::with_capacity(entry.num_partitions);
            let mut receivers = Vec::with_capacity(entry.num_partitions);
            for _ in 0..entry.num_partitions {
                let (tx, rx) = mpsc::unbounded_channel();
                senders.push(tx);
                receivers.push(Arc::new(Mutex::new(Some(rx))));
            }
            ConsumerGroup { senders, receivers }
        });

        group_entry.receivers.iter().cloned().map(|rx| Consumer { rx }).collect()
    }

    /// Publishes `envelope` on `topic`, keyed by `partition_key`, to
    /// every subscribed consumer group. Errors if no group has
    /// subscribed yet.
    pub fn publish(
        &self,
        topic: &str,
        partition_key: &str,
        envelope: Envelope,
    ) -> Result<(), EventBusError> {
        let topics = self.topics.lock();
        let entry = match topics.get(topic) {
            Some(t) if !t.groups.is_empty() => t,
            _ => return Err(EventBusError::NoSubscribers(topic.to_string())),
        };

        let partition_idx = partition_of(partition_key, entry.num_partitions);
        let delivery = Delivery { envelope, partition_key: partition_key.to_string() };

        for group in entry.groups.values() {
            group.senders[partition_idx]
                .send(delivery.clone())
                .map_err(|_| EventBusError::ChannelClosed)?;
        }
        Ok(())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4)
    }
}

fn partition_of(key: &str, num_partitions: usize) -> usize {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % num_partitions
}

/// One partition's receiving end for a consumer group.
pub struct Consumer {
    rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>>,
}

impl Consumer {
    /// Receives the next delivery, if the bus is still open.
    pub async fn recv(&self) -> Option<Delivery> {
        // Held across the await so exactly one task drains this
        // partition's queue at a time.
        let mut guard = self.rx.lock();
        let rx = guard.as_mut()?;
        rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn envelope(id: &str) -> Envelope {
        Envelope::new("Test", id, "corr", Value::Null)
    }

    #[tokio::test]
    async fn publish_without_subscriber_errors() {
        let bus = EventBus::new(1);
        let err = bus.publish("topic", "key", envelope("1")).unwrap_err();
        assert!(matches!(err, EventBusError::NoSubscribers(_)));
    }

    #[tokio::test]
    async fn subscriber_receives_published_message() {
        let bus = EventBus::new(1);
        let consumers = bus.subscribe("topic", "group-a");
        bus.publish("topic", "key", envelope("1")).unwrap();

        let delivery = consumers[0].recv().await.unwrap();
        assert_eq!(delivery.envelope.id, "1");
    }

    #[tokio::test]
    async fn same_key_preserves_order_on_one_partition() {
        let bus = EventBus::new(4);
        let consumers = bus.subscribe("topic", "workers");
        bus.publish("topic", "exec-1", envelope("1")).unwrap();
        bus.publish("topic", "exec-1", envelope("2")).unwrap();

        let mut received = Vec::new();
        for consumer in &consumers {
            while let Ok(Some(delivery)) =
                tokio::time::timeout(std::time::Duration::from_millis(10), consumer.recv()).await
            {
                received.push(delivery.envelope.id);
            }
        }
        assert_eq!(received, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn independent_groups_each_get_a_copy() {
        let bus = EventBus::new(1);
        let dispatchers = bus.subscribe("topic", "dispatchers");
        let workers = bus.subscribe("topic", "workers");
        bus.publish("topic", "key", envelope("1")).unwrap();

        assert_eq!(dispatchers[0].recv().await.unwrap().envelope.id, "1");
        assert_eq!(workers[0].recv().await.unwrap().envelope.id, "1");
    }
}
