use async_trait::async_trait;
use nebula_core::{ExecutionContext, ExecutionId, ExecutionStatus, NodeInputState, WorkflowGroupId, WorkflowId};
use nebula_workflow::{Connection, Workflow, WorkflowNode, WorkflowStatus};

use crate::error::StorageError;
use crate::filter::{Paging, Sort, WorkflowFilter};

pub type Result<T> = std::result::Result<T, StorageError>;

/// Workflow drafts and published snapshots. `publish` is the one
/// transactional operation: within a `workflow_group_id`, it demotes
/// any previously-published member and promotes `id`, or changes
/// nothing (spec §4.3, §9 "publish swap").
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn save(&self, workflow: Workflow) -> Result<Workflow>;
    async fn get_by_id(&self, id: WorkflowId) -> Result<Workflow>;
    async fn get_current(&self, group_id: WorkflowGroupId) -> Result<Workflow>;
    async fn get_draft(&self, group_id: WorkflowGroupId) -> Result<Workflow>;
    async fn get_published(&self, group_id: WorkflowGroupId) -> Result<Workflow>;
    async fn list(
        &self,
        filter: WorkflowFilter,
        paging: Paging,
        sort: Sort,
    ) -> Result<Vec<Workflow>>;
    /// Idempotent: soft-deleting an already-deleted workflow is not an
    /// error.
    async fn delete(&self, id: WorkflowId) -> Result<()>;
    async fn publish(&self, id: WorkflowId) -> Result<Workflow>;
}

#[async_trait]
pub trait NodeRepository: Send + Sync {
    async fn save_node(&self, workflow_id: WorkflowId, node: WorkflowNode) -> Result<()>;
    async fn get_node(&self, workflow_id: WorkflowId, node_id: &str) -> Result<WorkflowNode>;
    async fn get_nodes(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowNode>>;
    /// The dispatcher's trigger-match query (spec §4.6 step 1).
    async fn find_trigger_nodes(
        &self,
        source_id: &str,
        event_type: &str,
        provider_id: &str,
        status: WorkflowStatus,
    ) -> Result<Vec<(WorkflowId, WorkflowNode)>>;
}

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Rejects malformed `source_port`/`target_port` with
    /// `StorageError::InvalidPortFormat`.
    async fn save_connection(&self, workflow_id: WorkflowId, connection: Connection) -> Result<()>;
    async fn get_outgoing(&self, workflow_id: WorkflowId, source_node_id: &str) -> Result<Vec<Connection>>;
    async fn get_incoming(&self, workflow_id: WorkflowId, target_node_id: &str) -> Result<Vec<Connection>>;
    async fn get_all(&self, workflow_id: WorkflowId) -> Result<Vec<Connection>>;
    async fn delete_connection(&self, workflow_id: WorkflowId, connection_id: nebula_core::ConnectionId) -> Result<()>;
}

#[async_trait]
pub trait ExecutionContextRepository: Send + Sync {
    /// Upsert keyed by `ExecutionContext::id`.
    async fn save(&self, context: ExecutionContext) -> Result<()>;
    async fn get(&self, id: ExecutionId) -> Result<ExecutionContext>;
    async fn list_by_workflow(&self, published_workflow_id: WorkflowId) -> Result<Vec<ExecutionContext>>;
    async fn list_by_status(&self, status: ExecutionStatus) -> Result<Vec<ExecutionContext>>;
}

#[async_trait]
pub trait InputCoordinationRepository: Send + Sync {
    async fn save_state(&self, state: NodeInputState) -> Result<()>;
    async fn load_state(&self, node_execution_id: uuid::Uuid) -> Result<NodeInputState>;
    /// The oldest pending attempt for this node within this execution,
    /// used to route a newly-arrived input to the right in-flight
    /// coordination record.
    async fn find_pending(&self, node_id: &str, execution_id: ExecutionId) -> Result<Option<NodeInputState>>;
    async fn delete_state(&self, node_execution_id: uuid::Uuid) -> Result<()>;
    async fn cleanup_expired(&self, max_age: std::time::Duration) -> Result<u64>;
}
