//! Publish-time validation: builds a `petgraph` view of a draft workflow
//! and checks the invariants the spec requires before a snapshot can go
//! live.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::domain::Workflow;
use crate::error::WorkflowError;

/// A directed view of a workflow's nodes and connections, used only to
/// check structural invariants at publish time.
pub struct WorkflowGraph {
    graph: DiGraph<String, ()>,
    index_by_node: HashMap<String, NodeIndex>,
}

impl WorkflowGraph {
    pub fn build(workflow: &Workflow) -> Self {
        let mut graph = DiGraph::new();
        let mut index_by_node = HashMap::new();

        for node in &workflow.nodes {
            let idx = graph.add_node(node.id.clone());
            index_by_node.insert(node.id.clone(), idx);
        }

        for conn in &workflow.connections {
            if let (Some(source), Some(target)) =
                (conn.source_node_id(), conn.target_node_id())
            {
                if let (Some(&from), Some(&to)) =
                    (index_by_node.get(source), index_by_node.get(target))
                {
                    graph.add_edge(from, to, ());
                }
            }
        }

        Self { graph, index_by_node }
    }

    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    pub fn node_count(&self) -> usize {
        self.index_by_node.len()
    }
}

/// Validates a workflow for publishing.
///
/// Per spec: a published workflow must have at least one node and at
/// least one trigger node; every connection must reference node ids
/// that exist in the workflow. Cycles are **not** rejected — the spec
/// leaves cycle handling as an open question and only asks that
/// implementations warn, so a cyclic graph is logged and allowed
/// through.
pub fn validate_for_publish(workflow: &Workflow) -> Result<(), WorkflowError> {
    if workflow.nodes.is_empty() {
        return Err(WorkflowError::EmptyWorkflow);
    }

    if workflow.trigger_nodes().next().is_none() {
        return Err(WorkflowError::NoTriggerNode);
    }

    let known_ids: std::collections::HashSet<&str> =
        workflow.nodes.iter().map(|n| n.id.as_str()).collect();

    for conn in &workflow.connections {
        let source = conn
            .source_node_id()
            .ok_or_else(|| WorkflowError::DanglingConnection { connection_id: conn.id })?;
        let target = conn
            .target_node_id()
            .ok_or_else(|| WorkflowError::DanglingConnection { connection_id: conn.id })?;

        if !known_ids.contains(source) || !known_ids.contains(target) {
            return Err(WorkflowError::DanglingConnection { connection_id: conn.id });
        }
    }

    let graph = WorkflowGraph::build(workflow);
    if graph.is_cyclic() {
        tracing::warn!(workflow_id = %workflow.id, "publishing a workflow whose graph contains a cycle");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Connection, NodeCategory, Position, WorkflowNode, WorkflowStatus};
    use chrono::Utc;
    use nebula_core::{ConnectionId, NodeTypeKey, WorkflowGroupId, WorkflowId};
    use std::collections::HashMap as Map;

    fn node(id: &str, category: NodeCategory) -> WorkflowNode {
        WorkflowNode {
            id: id.to_string(),
            node_type: NodeTypeKey::new("http.request").unwrap(),
            category,
            name: id.to_string(),
            config: serde_json::Value::Null,
            enabled: true,
            position: Position { x: 0.0, y: 0.0 },
            source_id: None,
            provider_id: None,
            event_type: None,
        }
    }

    fn empty_workflow() -> Workflow {
        Workflow {
            id: WorkflowId::v4(),
            workflow_group_id: WorkflowGroupId::v4(),
            status: WorkflowStatus::Draft,
            name: "wf".into(),
            description: String::new(),
            variables: Map::new(),
            metadata: Map::new(),
            owner: "test".into(),
            nodes: vec![],
            connections: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            published_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn empty_workflow_rejected() {
        let workflow = empty_workflow();
        assert!(matches!(
            validate_for_publish(&workflow),
            Err(WorkflowError::EmptyWorkflow)
        ));
    }

    #[test]
    fn workflow_without_trigger_rejected() {
        let mut workflow = empty_workflow();
        workflow.nodes.push(node("a1", NodeCategory::Action));
        assert!(matches!(
            validate_for_publish(&workflow),
            Err(WorkflowError::NoTriggerNode)
        ));
    }

    #[test]
    fn connection_to_missing_node_rejected() {
        let mut workflow = empty_workflow();
        workflow.nodes.push(node("t1", NodeCategory::Trigger));
        workflow.connections.push(Connection {
            id: ConnectionId::v4(),
            source_port: "t1:main".into(),
            target_port: "missing:in".into(),
        });
        assert!(matches!(
            validate_for_publish(&workflow),
            Err(WorkflowError::DanglingConnection { .. })
        ));
    }

    #[test]
    fn valid_workflow_publishes() {
        let mut workflow = empty_workflow();
        workflow.nodes.push(node("t1", NodeCategory::Trigger));
        workflow.nodes.push(node("a1", NodeCategory::Action));
        workflow.connections.push(Connection {
            id: ConnectionId::v4(),
            source_port: "t1:main".into(),
            target_port: "a1:in".into(),
        });
        assert!(validate_for_publish(&workflow).is_ok());
    }

    #[test]
    fn cyclic_workflow_is_allowed_through() {
        let mut workflow = empty_workflow();
        workflow.nodes.push(node("t1", NodeCategory::Trigger));
        workflow.nodes.push(node("a1", NodeCategory::Action));
        workflow.connections.push(Connection {
            id: ConnectionId::v4(),
            source_port: "t1:main".into(),
            target_port: "a1:in".into(),
        });
        workflow.connections.push(Connection {
            id: ConnectionId::v4(),
            source_port: "a1:main".into(),
            target_port: "t1:in".into(),
        });

        let graph = WorkflowGraph::build(&workflow);
        assert!(graph.is_cyclic());
        // Cycles warn, they do not fail publish.
        assert!(validate_for_publish(&workflow).is_ok());
    }
}
