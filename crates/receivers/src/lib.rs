//! # Nebula Receivers
//!
//! Source adapters that turn an external signal — a cron tick, an
//! inbound HTTP call, a queue message — into a [`TriggerEvent`]
//! published on `operion.trigger`. Receivers are stateless with respect
//! to workflows: they know nothing about which workflow, if any, cares
//! about the event they just emitted. That matching happens downstream,
//! in the dispatcher.
//!
//! Every adapter implements [`Receiver`]: `start` runs until its
//! [`CancellationToken`] fires, emitting through the supplied
//! [`Emit`] on every fire of its source.

#![forbid(unsafe_code)]

pub mod error;
pub mod queue;
pub mod scheduler;
pub mod webhook;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use error::ReceiverError;
pub use nebula_eventbus::TriggerEvent;
pub use queue::{QueueMessage, QueueReceiver, QueueSource};
pub use scheduler::{CronSchedule, SchedulerReceiver};
pub use webhook::{WebhookReceiver, WebhookRoute};

/// Publishes a [`TriggerEvent`] somewhere downstream — in practice, onto
/// the event bus's `operion.trigger` topic. A trait rather than a bare
/// `Arc<EventBus>` so receivers stay decoupled from the bus's concrete
/// publish signature and tests can swap in a recording stub.
#[async_trait]
pub trait Emit: Send + Sync {
    async fn emit(&self, event: TriggerEvent) -> Result<(), ReceiverError>;
}

/// One source adapter. `start` must run until `cancellation` is
/// cancelled, calling `emit.emit(..)` every time the source fires, and
/// return `Ok(())` on a clean, cooperative shutdown.
#[async_trait]
pub trait Receiver: Send + Sync {
    async fn start(&self, cancellation: CancellationToken, emit: std::sync::Arc<dyn Emit>) -> Result<(), ReceiverError>;
}

/// [`Emit`] backed directly by an [`nebula_eventbus::EventBus`], publishing
/// to [`nebula_eventbus::TRIGGER_TOPIC`] keyed by the event's own id (trigger
/// events have no execution to partition by yet).
pub struct BusEmitter {
    bus: std::sync::Arc<nebula_eventbus::EventBus>,
}

impl BusEmitter {
    pub fn new(bus: std::sync::Arc<nebula_eventbus::EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Emit for BusEmitter {
    async fn emit(&self, event: TriggerEvent) -> Result<(), ReceiverError> {
        let envelope = nebula_eventbus::Envelope::new(
            nebula_eventbus::message_type::TRIGGER_EVENT,
            event.id.clone(),
            event.id.clone(),
            serde_json::to_value(&event).map_err(|e| ReceiverError::Publish(e.to_string()))?,
        );
        self.bus
            .publish(nebula_eventbus::TRIGGER_TOPIC, &event.id, envelope)
            .map_err(|e| ReceiverError::Publish(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct RecordingEmitter {
        pub events: Mutex<Vec<TriggerEvent>>,
    }

    #[async_trait]
    impl Emit for RecordingEmitter {
        async fn emit(&self, event: TriggerEvent) -> Result<(), ReceiverError> {
            self.events.lock().push(event);
            Ok(())
        }
    }
}
