use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("malformed event payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] nebula_storage::error::StorageError),

    #[error(transparent)]
    Coordination(#[from] nebula_execution::ExecutionError),

    #[error(transparent)]
    Bus(#[from] nebula_eventbus::EventBusError),

    #[error("node {0} not found in published workflow")]
    NodeNotFound(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("unknown node type: {0}")]
    UnknownNodeType(#[from] nebula_action::RegistryError),
}
