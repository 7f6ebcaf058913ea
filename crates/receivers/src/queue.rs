//! Queue receiver: drains an external queue through a [`QueueSource`],
//! turning each message into exactly one [`crate::TriggerEvent`]. The
//! message is acknowledged only after the bus publish succeeds — a
//! process crash between receive and ack is recovered by the queue's
//! own redelivery, giving at-least-once delivery into the bus.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::ReceiverError;
use crate::{Emit, Receiver, TriggerEvent};

/// One message pulled off a queue, opaque beyond what the receiver
/// needs to build a [`TriggerEvent`] and ack it back.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub id: String,
    pub body: serde_json::Value,
}

/// A generic external queue. Implementations own the protocol
/// (SQS, RabbitMQ, Redis streams, ...); the receiver only needs
/// receive-and-ack.
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Pulls the next message, if any is currently available.
    async fn recv(&self) -> Result<Option<QueueMessage>, ReceiverError>;

    /// Acknowledges a message, removing it from the queue's in-flight set.
    async fn ack(&self, message: QueueMessage) -> Result<(), ReceiverError>;
}

/// A receiver draining a single [`QueueSource`].
pub struct QueueReceiver<S: QueueSource> {
    source: S,
    provider_id: String,
    event_type: String,
    poll_interval: std::time::Duration,
}

impl<S: QueueSource> QueueReceiver<S> {
    pub fn new(source: S, provider_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            source,
            provider_id: provider_id.into(),
            event_type: event_type.into(),
            poll_interval: std::time::Duration::from_millis(200),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl<S: QueueSource + Send + Sync + 'static> Receiver for QueueReceiver<S> {
    async fn start(&self, cancellation: CancellationToken, emit: Arc<dyn Emit>) -> Result<(), ReceiverError> {
        loop {
            if cancellation.is_cancelled() {
                return Ok(());
            }

            let message = tokio::select! {
                _ = cancellation.cancelled() => return Ok(()),
                result = self.source.recv() => result?,
            };

            let Some(message) = message else {
                tokio::select! {
                    _ = cancellation.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
                continue;
            };

            let event = TriggerEvent {
                id: message.id.clone(),
                source_id: message.id.clone(),
                provider_id: self.provider_id.clone(),
                event_type: self.event_type.clone(),
                data: message.body.clone(),
                emitted_at: Utc::now(),
            };

            emit.emit(event).await?;
            self.source.ack(message).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingEmitter;
    use parking_lot::Mutex;

    struct StubQueue {
        messages: Mutex<Vec<QueueMessage>>,
        acked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueueSource for StubQueue {
        async fn recv(&self) -> Result<Option<QueueMessage>, ReceiverError> {
            Ok(self.messages.lock().pop())
        }

        async fn ack(&self, message: QueueMessage) -> Result<(), ReceiverError> {
            self.acked.lock().push(message.id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn drains_one_message_then_stops_on_cancellation() {
        let queue = StubQueue {
            messages: Mutex::new(vec![QueueMessage { id: "m1".to_string(), body: serde_json::json!({"x": 1}) }]),
            acked: Mutex::new(Vec::new()),
        };
        let receiver = QueueReceiver::new(queue, "queue", "message_received")
            .with_poll_interval(std::time::Duration::from_millis(5));
        let emitter: Arc<dyn Emit> = Arc::new(RecordingEmitter::default());
        let token = CancellationToken::new();

        let child = token.clone();
        let handle = tokio::spawn(async move { receiver.start(child, emitter).await });

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
