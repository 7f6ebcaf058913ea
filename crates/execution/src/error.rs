//! Execution error types.

use nebula_core::{ExecutionStatus, NodeId};
use thiserror::Error;

/// Errors that can occur during workflow execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A state transition is not valid for the current status.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
    },

    /// A referenced node does not exist in the execution state.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// An idempotency key has already been used.
    #[error("duplicate idempotency key: {0}")]
    DuplicateIdempotencyKey(String),

    /// A serialization or deserialization error.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The persistence layer backing input coordination or execution
    /// state failed.
    #[error("storage: {0}")]
    Storage(#[from] nebula_storage::StorageError),

    /// The execution was cancelled.
    #[error("execution cancelled")]
    Cancelled,
}

impl ExecutionError {
    /// Create an invalid-transition error from execution statuses.
    pub fn invalid_execution_transition(from: ExecutionStatus, to: ExecutionStatus) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display() {
        let err = ExecutionError::InvalidTransition {
            from: "running".into(),
            to: "cancelled".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid transition from running to cancelled"
        );
    }

    #[test]
    fn node_not_found_display() {
        let id = NodeId::new("fetch_users").unwrap();
        let err = ExecutionError::NodeNotFound(id);
        assert!(err.to_string().contains("node not found"));
    }

    #[test]
    fn invalid_execution_transition_helper() {
        let err = ExecutionError::invalid_execution_transition(
            ExecutionStatus::Completed,
            ExecutionStatus::Running,
        );
        assert_eq!(
            err.to_string(),
            "invalid transition from completed to running"
        );
    }

    #[test]
    fn from_serde_error() {
        let serde_err = serde_json::from_str::<String>("not valid json").unwrap_err();
        let err = ExecutionError::from(serde_err);
        assert!(err.to_string().starts_with("serialization:"));
    }

    #[test]
    fn cancelled_display() {
        let err = ExecutionError::Cancelled;
        assert_eq!(err.to_string(), "execution cancelled");
    }
}
