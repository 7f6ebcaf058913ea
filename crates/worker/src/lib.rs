//! # Nebula Worker
//!
//! The graph executor (spec §4.7): consumes `WorkflowTriggered` and
//! `NodeCompleted` events from `operion.events`, drives a published
//! workflow's nodes to completion through the registry and the input
//! coordinator, and emits `WorkflowCompleted`/`WorkflowFailed` once an
//! execution has nothing left pending.

#![forbid(unsafe_code)]

pub mod error;
pub mod worker;

pub use error::WorkerError;
pub use worker::{is_published, Worker};
