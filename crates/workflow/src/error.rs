use nebula_core::ConnectionId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("workflow has no nodes")]
    EmptyWorkflow,

    #[error("workflow has no trigger node")]
    NoTriggerNode,

    #[error("connection {connection_id} references a node id that does not exist in this workflow")]
    DanglingConnection { connection_id: ConnectionId },
}
