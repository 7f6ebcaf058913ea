use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("malformed trigger event payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] nebula_storage::error::StorageError),

    #[error(transparent)]
    Bus(#[from] nebula_eventbus::EventBusError),
}
