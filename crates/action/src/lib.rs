//! # Nebula Action System
//!
//! The node-execution contract shared by the worker and every concrete
//! node type (http, transform, log, file_write, conditional, merge).
//!
//! Defines **what** a node is and **how it communicates** with the
//! graph executor, but not how the executor schedules or routes between
//! nodes — that lives in `nebula-execution`.
//!
//! ## Core types
//!
//! - [`Node`] — the trait every node type implements
//! - [`NodeFactory`] / [`NodeRegistry`] — builds node instances from a
//!   workflow node's config, keyed by registry type
//! - [`NodeOutput`] — the port → value map a node's execution produces
//! - [`ActionError`] — error type distinguishing retryable from fatal failures
//! - [`ActionContext`] — runtime context with IDs, variables, cancellation
//! - [`ActionMetadata`] — static descriptor (key, category, config schema)

#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod metadata;
pub mod node;
pub mod nodes;
pub mod port;
pub mod registry;
pub mod result;

pub use context::ActionContext;
pub use error::ActionError;
pub use metadata::ActionMetadata;
pub use node::{Node, NodeFactory};
pub use nodes::register_builtin_nodes;
pub use port::{InputPort, OutputPort, PortKey, default_input_ports, default_output_ports, ERROR_PORT, MAIN_PORT};
pub use registry::{NodeRegistry, RegistryError};
pub use result::NodeOutput;
