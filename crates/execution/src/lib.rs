#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Execution
//!
//! Input coordination for the Nebula workflow engine: merges fan-in inputs
//! arriving for a node across one or more upstream connections and decides
//! when the node is ready to fire (spec §4.9, C10).
//!
//! This crate models execution-time concepts — it does NOT contain the
//! worker loop that drives nodes to completion (see `nebula-worker`), nor
//! the execution record itself (see `nebula_core::ExecutionContext`).
//!
//! - [`InputCoordinator`] — merges fan-in inputs and decides node readiness

pub mod coordinator;
pub mod error;

pub use coordinator::{InputCoordinator, OfferOutcome};
pub use error::ExecutionError;
