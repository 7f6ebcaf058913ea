//! # Nebula Workflow
//!
//! The workflow graph's data model (`Workflow`, `WorkflowNode`,
//! `Connection`) and the structural checks a draft must pass before it
//! can be published as an immutable snapshot.

#![forbid(unsafe_code)]

pub mod domain;
pub mod error;
pub mod graph;

pub use domain::{Connection, NodeCategory, Position, Workflow, WorkflowNode, WorkflowStatus};
pub use error::WorkflowError;
pub use graph::{validate_for_publish, WorkflowGraph};
