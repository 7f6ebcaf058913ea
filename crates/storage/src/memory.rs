//! `DashMap`-backed in-memory repositories. Used by tests, the worker's
//! unit-test suite, and as a dev/single-process backend.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use nebula_core::{
    ConnectionId, ExecutionContext, ExecutionId, ExecutionStatus, NodeInputState, WorkflowGroupId,
    WorkflowId,
};
use nebula_validator::core::Validate;
use nebula_validator::validators::{port_format, sort_field_allowlist, WORKFLOW_SORT_FIELDS};
use nebula_workflow::{Connection, Workflow, WorkflowNode, WorkflowStatus};

use crate::error::StorageError;
use crate::filter::{Paging, Sort, SortDirection, WorkflowFilter};
use crate::traits::{
    ConnectionRepository, ExecutionContextRepository, InputCoordinationRepository, NodeRepository,
    Result, WorkflowRepository,
};

/// Single in-memory backing store shared by all five repository traits,
/// mirroring how a real database shares one connection pool across
/// repositories built over the same tables.
#[derive(Default)]
pub struct InMemoryStore {
    workflows: DashMap<WorkflowId, Workflow>,
    executions: DashMap<ExecutionId, ExecutionContext>,
    input_states: DashMap<uuid::Uuid, NodeInputState>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn group_members(&self, group_id: WorkflowGroupId) -> Vec<Workflow> {
        self.workflows
            .iter()
            .filter(|entry| entry.value().workflow_group_id == group_id && !entry.value().is_deleted())
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryStore {
    async fn save(&self, workflow: Workflow) -> Result<Workflow> {
        self.workflows.insert(workflow.id, workflow.clone());
        Ok(workflow)
    }

    async fn get_by_id(&self, id: WorkflowId) -> Result<Workflow> {
        self.workflows
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StorageError::WorkflowNotFound { id })
    }

    async fn get_current(&self, group_id: WorkflowGroupId) -> Result<Workflow> {
        self.group_members(group_id)
            .into_iter()
            .max_by_key(|w| w.updated_at)
            .ok_or(StorageError::WorkflowNotFound { id: WorkflowId::nil() })
    }

    async fn get_draft(&self, group_id: WorkflowGroupId) -> Result<Workflow> {
        self.group_members(group_id)
            .into_iter()
            .find(|w| w.status == WorkflowStatus::Draft)
            .ok_or(StorageError::WorkflowNotFound { id: WorkflowId::nil() })
    }

    async fn get_published(&self, group_id: WorkflowGroupId) -> Result<Workflow> {
        self.group_members(group_id)
            .into_iter()
            .find(|w| w.status == WorkflowStatus::Published)
            .ok_or(StorageError::WorkflowNotFound { id: WorkflowId::nil() })
    }

    async fn list(
        &self,
        filter: WorkflowFilter,
        paging: Paging,
        sort: Sort,
    ) -> Result<Vec<Workflow>> {
        sort_field_allowlist(WORKFLOW_SORT_FIELDS)
            .validate(sort.field.as_str())
            .map_err(|source| StorageError::InvalidSortField { field: sort.field.clone(), source })?;

        let mut matches: Vec<Workflow> = self
            .workflows
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|w| !w.is_deleted())
            .filter(|w| filter.workflow_group_id.is_none_or(|g| w.workflow_group_id == g))
            .filter(|w| filter.status.is_none_or(|s| w.status == s))
            .filter(|w| filter.owner.as_deref().is_none_or(|o| w.owner == o))
            .collect();

        match sort.field.as_str() {
            "created_at" => matches.sort_by_key(|w| w.created_at),
            "updated_at" => matches.sort_by_key(|w| w.updated_at),
            "name" => matches.sort_by(|a, b| a.name.cmp(&b.name)),
            // Unreachable: already validated against the allowlist above.
            _ => unreachable!("sort field already validated against allowlist"),
        }
        if sort.direction == SortDirection::Descending {
            matches.reverse();
        }

        let start = paging.offset as usize;
        let end = (start + paging.limit as usize).min(matches.len());
        Ok(if start >= matches.len() { Vec::new() } else { matches[start..end].to_vec() })
    }

    async fn delete(&self, id: WorkflowId) -> Result<()> {
        if let Some(mut entry) = self.workflows.get_mut(&id) {
            entry.deleted_at = Some(chrono::Utc::now());
        }
        // Idempotent: deleting an unknown or already-deleted id is not an error.
        Ok(())
    }

    async fn publish(&self, id: WorkflowId) -> Result<Workflow> {
        let target = self.get_by_id(id).await?;
        nebula_workflow::validate_for_publish(&target)
            .map_err(|err| match err {
                nebula_workflow::WorkflowError::EmptyWorkflow => StorageError::EmptyWorkflow,
                nebula_workflow::WorkflowError::NoTriggerNode => StorageError::NoTriggerNode,
                nebula_workflow::WorkflowError::DanglingConnection { .. } => {
                    StorageError::DanglingConnection
                }
            })?;

        // Atomic demote + promote: both mutations happen while holding
        // this store's per-row locks, with no `.await` in between.
        for mut entry in self.workflows.iter_mut() {
            if entry.value().workflow_group_id == target.workflow_group_id
                && entry.value().status == WorkflowStatus::Published
            {
                entry.status = WorkflowStatus::Unpublished;
            }
        }
        let now = chrono::Utc::now();
        let mut published = target;
        published.status = WorkflowStatus::Published;
        published.published_at = Some(now);
        published.updated_at = now;
        self.workflows.insert(published.id, published.clone());
        Ok(published)
    }
}

#[async_trait]
impl NodeRepository for InMemoryStore {
    async fn save_node(&self, workflow_id: WorkflowId, node: WorkflowNode) -> Result<()> {
        let mut entry = self
            .workflows
            .get_mut(&workflow_id)
            .ok_or(StorageError::WorkflowNotFound { id: workflow_id })?;
        if let Some(existing) = entry.nodes.iter_mut().find(|n| n.id == node.id) {
            *existing = node;
        } else {
            entry.nodes.push(node);
        }
        Ok(())
    }

    async fn get_node(&self, workflow_id: WorkflowId, node_id: &str) -> Result<WorkflowNode> {
        self.workflows
            .get(&workflow_id)
            .and_then(|entry| entry.value().node(node_id).cloned())
            .ok_or(StorageError::WorkflowNotFound { id: workflow_id })
    }

    async fn get_nodes(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowNode>> {
        self.workflows
            .get(&workflow_id)
            .map(|entry| entry.value().nodes.clone())
            .ok_or(StorageError::WorkflowNotFound { id: workflow_id })
    }

    async fn find_trigger_nodes(
        &self,
        source_id: &str,
        event_type: &str,
        provider_id: &str,
        status: WorkflowStatus,
    ) -> Result<Vec<(WorkflowId, WorkflowNode)>> {
        let mut matches = Vec::new();
        for entry in &self.workflows {
            let workflow = entry.value();
            if workflow.status != status || workflow.is_deleted() {
                continue;
            }
            for node in workflow.trigger_nodes() {
                if node.source_id.as_deref() == Some(source_id)
                    && node.event_type.as_deref() == Some(event_type)
                    && node.provider_id.as_deref() == Some(provider_id)
                {
                    matches.push((workflow.id, node.clone()));
                }
            }
        }
        Ok(matches)
    }
}

#[async_trait]
impl ConnectionRepository for InMemoryStore {
    async fn save_connection(&self, workflow_id: WorkflowId, connection: Connection) -> Result<()> {
        port_format()
            .validate(connection.source_port.as_str())
            .map_err(|source| StorageError::InvalidPortFormat { port: connection.source_port.clone(), source })?;
        port_format()
            .validate(connection.target_port.as_str())
            .map_err(|source| StorageError::InvalidPortFormat { port: connection.target_port.clone(), source })?;

        let mut entry = self
            .workflows
            .get_mut(&workflow_id)
            .ok_or(StorageError::WorkflowNotFound { id: workflow_id })?;
        if let Some(existing) = entry.connections.iter_mut().find(|c| c.id == connection.id) {
            *existing = connection;
        } else {
            entry.connections.push(connection);
        }
        Ok(())
    }

    async fn get_outgoing(&self, workflow_id: WorkflowId, source_node_id: &str) -> Result<Vec<Connection>> {
        self.workflows
            .get(&workflow_id)
            .map(|entry| entry.value().outgoing(source_node_id).cloned().collect())
            .ok_or(StorageError::WorkflowNotFound { id: workflow_id })
    }

    async fn get_incoming(&self, workflow_id: WorkflowId, target_node_id: &str) -> Result<Vec<Connection>> {
        self.workflows
            .get(&workflow_id)
            .map(|entry| entry.value().incoming(target_node_id).cloned().collect())
            .ok_or(StorageError::WorkflowNotFound { id: workflow_id })
    }

    async fn get_all(&self, workflow_id: WorkflowId) -> Result<Vec<Connection>> {
        self.workflows
            .get(&workflow_id)
            .map(|entry| entry.value().connections.clone())
            .ok_or(StorageError::WorkflowNotFound { id: workflow_id })
    }

    async fn delete_connection(&self, workflow_id: WorkflowId, connection_id: ConnectionId) -> Result<()> {
        let mut entry = self
            .workflows
            .get_mut(&workflow_id)
            .ok_or(StorageError::WorkflowNotFound { id: workflow_id })?;
        entry.connections.retain(|c| c.id != connection_id);
        Ok(())
    }
}

#[async_trait]
impl ExecutionContextRepository for InMemoryStore {
    async fn save(&self, context: ExecutionContext) -> Result<()> {
        self.executions.insert(context.id, context);
        Ok(())
    }

    async fn get(&self, id: ExecutionId) -> Result<ExecutionContext> {
        self.executions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StorageError::ExecutionNotFound { id: id.to_string() })
    }

    async fn list_by_workflow(&self, published_workflow_id: WorkflowId) -> Result<Vec<ExecutionContext>> {
        Ok(self
            .executions
            .iter()
            .filter(|entry| entry.value().published_workflow_id == published_workflow_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn list_by_status(&self, status: ExecutionStatus) -> Result<Vec<ExecutionContext>> {
        Ok(self
            .executions
            .iter()
            .filter(|entry| entry.value().status == status)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[async_trait]
impl InputCoordinationRepository for InMemoryStore {
    async fn save_state(&self, state: NodeInputState) -> Result<()> {
        self.input_states.insert(state.node_execution_id, state);
        Ok(())
    }

    async fn load_state(&self, node_execution_id: uuid::Uuid) -> Result<NodeInputState> {
        self.input_states
            .get(&node_execution_id)
            .map(|entry| entry.value().clone())
            .ok_or(StorageError::InputStateNotFound { node_execution_id: node_execution_id.to_string() })
    }

    async fn find_pending(&self, node_id: &str, execution_id: ExecutionId) -> Result<Option<NodeInputState>> {
        Ok(self
            .input_states
            .iter()
            .filter(|entry| entry.value().node_id == node_id && entry.value().execution_id == execution_id)
            .min_by_key(|entry| entry.value().created_at)
            .map(|entry| entry.value().clone()))
    }

    async fn delete_state(&self, node_execution_id: uuid::Uuid) -> Result<()> {
        self.input_states.remove(&node_execution_id);
        Ok(())
    }

    async fn cleanup_expired(&self, max_age: std::time::Duration) -> Result<u64> {
        let hard_floor = max_age.saturating_mul(2);
        let expired: Vec<uuid::Uuid> = self
            .input_states
            .iter()
            .filter(|entry| {
                let state = entry.value();
                if state.is_expired(hard_floor) {
                    return true;
                }
                if !state.is_expired(max_age) {
                    return false;
                }
                // Between max_age and the hard floor: only reap states
                // whose owning execution is still running — a completed
                // execution's leftover state waits for the hard floor.
                self.executions
                    .get(&state.execution_id)
                    .map(|e| e.value().is_running())
                    .unwrap_or(true)
            })
            .map(|entry| *entry.key())
            .collect();
        let count = expired.len() as u64;
        for id in &expired {
            self.input_states.remove(id);
        }
        if count > 0 {
            tracing::info!(count, "swept expired node input states");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn draft_workflow(group: WorkflowGroupId) -> Workflow {
        let now = chrono::Utc::now();
        Workflow {
            id: WorkflowId::v4(),
            workflow_group_id: group,
            status: WorkflowStatus::Draft,
            name: "wf".into(),
            description: String::new(),
            variables: HashMap::new(),
            metadata: HashMap::new(),
            owner: "tester".into(),
            nodes: vec![WorkflowNode {
                id: "trigger".into(),
                node_type: nebula_core::NodeTypeKey::new("cron").unwrap(),
                category: nebula_workflow::NodeCategory::Trigger,
                name: "Cron".into(),
                config: serde_json::Value::Null,
                enabled: true,
                position: nebula_workflow::Position { x: 0.0, y: 0.0 },
                source_id: Some("cron-1".into()),
                provider_id: Some("internal".into()),
                event_type: Some("tick".into()),
            }],
            connections: vec![],
            created_at: now,
            updated_at: now,
            published_at: None,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn save_then_get_by_id_round_trips() {
        let store = InMemoryStore::new();
        let group = WorkflowGroupId::v4();
        let saved = store.save(draft_workflow(group)).await.unwrap();
        let fetched = store.get_by_id(saved.id).await.unwrap();
        assert_eq!(fetched.id, saved.id);
    }

    #[tokio::test]
    async fn publish_promotes_and_demotes_within_group() {
        let store = InMemoryStore::new();
        let group = WorkflowGroupId::v4();
        let v1 = store.save(draft_workflow(group)).await.unwrap();
        store.publish(v1.id).await.unwrap();

        let mut v2 = draft_workflow(group);
        v2.id = WorkflowId::v4();
        let v2 = store.save(v2).await.unwrap();
        store.publish(v2.id).await.unwrap();

        let published = store.get_published(group).await.unwrap();
        assert_eq!(published.id, v2.id);
        let demoted = store.get_by_id(v1.id).await.unwrap();
        assert_eq!(demoted.status, WorkflowStatus::Unpublished);
    }

    #[tokio::test]
    async fn publish_rejects_workflow_without_trigger() {
        let store = InMemoryStore::new();
        let group = WorkflowGroupId::v4();
        let mut workflow = draft_workflow(group);
        workflow.nodes.clear();
        let saved = store.save(workflow).await.unwrap();
        let err = store.publish(saved.id).await.unwrap_err();
        assert!(matches!(err, StorageError::EmptyWorkflow));
    }

    #[tokio::test]
    async fn list_rejects_disallowed_sort_field() {
        let store = InMemoryStore::new();
        let err = store
            .list(WorkflowFilter::default(), Paging::default(), Sort::new("owner", SortDirection::Ascending))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidSortField { .. }));
    }

    #[tokio::test]
    async fn save_connection_rejects_malformed_port() {
        let store = InMemoryStore::new();
        let group = WorkflowGroupId::v4();
        let saved = store.save(draft_workflow(group)).await.unwrap();
        let err = store
            .save_connection(
                saved.id,
                Connection { id: nebula_core::ConnectionId::v4(), source_port: "no-colon".into(), target_port: "b:in".into() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPortFormat { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryStore::new();
        let group = WorkflowGroupId::v4();
        let saved = store.save(draft_workflow(group)).await.unwrap();
        store.delete(saved.id).await.unwrap();
        store.delete(saved.id).await.unwrap();
        store.delete(WorkflowId::v4()).await.unwrap();
    }

    #[tokio::test]
    async fn input_state_ready_when_required_ports_arrive() {
        let store = InMemoryStore::new();
        let execution_id = ExecutionId::v4();
        let requirements = nebula_core::InputRequirements::new(vec![nebula_core::PortName::new("main").unwrap()]);
        let mut state = NodeInputState::new("n1", execution_id, requirements);
        let ready = state.receive("main", nebula_core::NodeResult::success("upstream", HashMap::new()));
        assert!(ready);
        store.save_state(state.clone()).await.unwrap();

        let found = store.find_pending("n1", execution_id).await.unwrap();
        assert!(found.is_some());

        store.delete_state(state.node_execution_id).await.unwrap();
        assert!(store.find_pending("n1", execution_id).await.unwrap().is_none());
    }
}
