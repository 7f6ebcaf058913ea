//! # Nebula Core
//!
//! Core identifier types shared by every crate in the workflow engine.
//! This crate provides the fundamental building blocks used throughout:
//! strongly-typed entity ids (`WorkflowId`, `ExecutionId`, ...) and
//! string-keyed identifiers (node-type key, port name).
//!
//! ## Usage
//!
//! ```rust
//! use nebula_core::{ExecutionId, WorkflowId};
//!
//! let execution_id = ExecutionId::v4();
//! let workflow_id = WorkflowId::v4();
//! assert_ne!(execution_id.to_string(), workflow_id.to_string());
//! ```

#![forbid(unsafe_code)]

pub mod id;
pub mod keys;
pub mod model;

mod error;

pub use error::CoreError;
pub use id::{ConnectionId, ExecutionId, UuidParseError, WorkflowGroupId, WorkflowId};
pub use keys::{NodeId, NodeTypeKey, PortName};
pub use model::{
    ExecutionContext, ExecutionStatus, InputRequirements, NodeInputState, NodeResult,
    NodeResultStatus, WaitMode,
};

/// Result type used throughout crates that only deal in id/key parsing.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Common prelude for downstream crates.
pub mod prelude {
    pub use crate::{
        ConnectionId, CoreError, ExecutionContext, ExecutionId, ExecutionStatus,
        InputRequirements, NodeId, NodeInputState, NodeResult, NodeResultStatus, NodeTypeKey,
        PortName, Result, WaitMode, WorkflowGroupId, WorkflowId,
    };
}
