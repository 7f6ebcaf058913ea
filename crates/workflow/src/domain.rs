//! The workflow graph's data model: workflows, nodes, and connections.

use chrono::{DateTime, Utc};
use nebula_core::{ConnectionId, NodeTypeKey, WorkflowGroupId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Lifecycle state of a `Workflow`. Within a `workflow_group_id`, at most
/// one member carries `Published` — `publish()` atomically demotes the
/// previous holder (see `nebula-storage`'s `WorkflowRepository::publish`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Published,
    Unpublished,
    Inactive,
}

/// Coarse role a `WorkflowNode` plays in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Trigger,
    Action,
    Control,
}

/// UI-only placement, opaque to the core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A node in a workflow graph, identified by a string id unique within
/// its workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeTypeKey,
    pub category: NodeCategory,
    pub name: String,
    pub config: Value,
    pub enabled: bool,
    pub position: Position,

    /// Trigger identity — only meaningful when `category == Trigger`.
    /// The dispatcher matches incoming `TriggerEvent`s against these.
    pub source_id: Option<String>,
    pub provider_id: Option<String>,
    pub event_type: Option<String>,
}

impl WorkflowNode {
    pub fn is_trigger(&self) -> bool {
        matches!(self.category, NodeCategory::Trigger)
    }
}

/// A directed edge between two node ports.
///
/// `source_port`/`target_port` are strings of the form
/// `"<node_id>:<port_name>"` — validated at write time by the
/// persistence layer, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source_port: String,
    pub target_port: String,
}

impl Connection {
    /// Splits `"<node_id>:<port_name>"` into its two halves. Assumes the
    /// string has already been validated against the port-format rule.
    pub fn split_port(port: &str) -> Option<(&str, &str)> {
        port.split_once(':')
    }

    pub fn source_node_id(&self) -> Option<&str> {
        Self::split_port(&self.source_port).map(|(node, _)| node)
    }

    pub fn target_node_id(&self) -> Option<&str> {
        Self::split_port(&self.target_port).map(|(node, _)| node)
    }
}

/// A workflow: a versioned directed graph of nodes and connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub workflow_group_id: WorkflowGroupId,
    pub status: WorkflowStatus,
    pub name: String,
    pub description: String,
    pub variables: HashMap<String, Value>,
    pub metadata: HashMap<String, Value>,
    pub owner: String,
    pub nodes: Vec<WorkflowNode>,
    pub connections: Vec<Connection>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn trigger_nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes.iter().filter(|n| n.is_trigger())
    }

    pub fn outgoing(&self, node_id: &str) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(move |c| c.source_node_id() == Some(node_id))
    }

    pub fn incoming(&self, node_id: &str) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(move |c| c.target_node_id() == Some(node_id))
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, category: NodeCategory) -> WorkflowNode {
        WorkflowNode {
            id: id.to_string(),
            node_type: NodeTypeKey::new("http.request").unwrap(),
            category,
            name: id.to_string(),
            config: Value::Null,
            enabled: true,
            position: Position { x: 0.0, y: 0.0 },
            source_id: None,
            provider_id: None,
            event_type: None,
        }
    }

    #[test]
    fn connection_splits_node_and_port() {
        let conn = Connection {
            id: ConnectionId::v4(),
            source_port: "a:main".to_string(),
            target_port: "b:in".to_string(),
        };
        assert_eq!(conn.source_node_id(), Some("a"));
        assert_eq!(conn.target_node_id(), Some("b"));
    }

    #[test]
    fn malformed_port_has_no_node_id() {
        let conn = Connection {
            id: ConnectionId::v4(),
            source_port: "no-colon".to_string(),
            target_port: "b:in".to_string(),
        };
        assert_eq!(conn.source_node_id(), None);
    }

    #[test]
    fn trigger_nodes_filters_by_category() {
        let workflow = Workflow {
            id: WorkflowId::v4(),
            workflow_group_id: WorkflowGroupId::v4(),
            status: WorkflowStatus::Draft,
            name: "wf".into(),
            description: String::new(),
            variables: HashMap::new(),
            metadata: HashMap::new(),
            owner: "test".into(),
            nodes: vec![node("t1", NodeCategory::Trigger), node("a1", NodeCategory::Action)],
            connections: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            published_at: None,
            deleted_at: None,
        };

        let triggers: Vec<_> = workflow.trigger_nodes().collect();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].id, "t1");
    }
}
