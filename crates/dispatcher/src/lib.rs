//! # Nebula Dispatcher
//!
//! Matches `TriggerEvent`s against published trigger nodes and fans
//! each match out as a `WorkflowTriggered` event (spec §4.6). The
//! dispatcher owns no workflow execution state — it is a stateless
//! routing layer between receivers and workers.

#![forbid(unsafe_code)]

pub mod dispatcher;
pub mod error;

pub use dispatcher::{deterministic_execution_id, Dispatcher};
pub use error::DispatcherError;
