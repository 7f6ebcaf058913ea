//! # Nebula Event Bus
//!
//! A topic-based, partitioned pub/sub transport with consumer groups
//! and at-least-once delivery. Used for the two canonical topics the
//! engine defines: `operion.trigger` (receivers → dispatcher) and
//! `operion.events` (dispatcher/worker → worker, partitioned by
//! `execution_id` to preserve per-execution ordering).

#![forbid(unsafe_code)]

pub mod bus;
pub mod envelope;
pub mod payloads;
pub mod topics;

pub use bus::{Consumer, Delivery, EventBus, EventBusError};
pub use envelope::Envelope;
pub use payloads::{
    message_type, NodeCompleted, NodeFailed, TriggerEvent, WorkflowCompleted, WorkflowFailed, WorkflowTriggered,
};
pub use topics::{EVENTS_TOPIC, TRIGGER_TOPIC};
