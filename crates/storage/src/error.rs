use nebula_core::WorkflowId;
use thiserror::Error;

/// Errors surfaced by every repository. Callers decide recovery —
/// repositories never retry internally (spec §4.3 partial-failure
/// semantics).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("workflow {id} not found")]
    WorkflowNotFound { id: WorkflowId },

    #[error("execution {id} not found")]
    ExecutionNotFound { id: String },

    #[error("node input state {node_execution_id} not found")]
    InputStateNotFound { node_execution_id: String },

    #[error("workflow has no nodes")]
    EmptyWorkflow,

    #[error("workflow has no trigger node")]
    NoTriggerNode,

    #[error("connection references a node id that does not exist in this workflow")]
    DanglingConnection,

    #[error("'{field}' is not a sortable column: {source}")]
    InvalidSortField {
        field: String,
        #[source]
        source: nebula_validator::ValidationError,
    },

    #[error("'{port}' is not of the form <node_id>:<port_name>: {source}")]
    InvalidPortFormat {
        port: String,
        #[source]
        source: nebula_validator::ValidationError,
    },

    #[error("backend operation failed: {0}")]
    Backend(String),
}
