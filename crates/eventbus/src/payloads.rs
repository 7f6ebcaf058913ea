//! Typed payloads for the event kinds the engine moves over
//! `operion.trigger`/`operion.events`. Each is carried inside an
//! [`crate::Envelope`]'s `payload` as JSON; `message_type` names which
//! variant it is — see the [`message_type`] constants.
//!
//! The bus itself stays payload-agnostic (`Envelope.payload` is a bare
//! `serde_json::Value`); these structs are the shared contract the
//! receivers/dispatcher/worker crates serialize into and deserialize
//! out of that value, so the wire shape lives in exactly one place.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nebula_core::{ExecutionId, NodeResult, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `message_type` values used to discriminate [`crate::Envelope::message_type`].
pub mod message_type {
    pub const TRIGGER_EVENT: &str = "TriggerEvent";
    pub const WORKFLOW_TRIGGERED: &str = "WorkflowTriggered";
    pub const NODE_COMPLETED: &str = "NodeCompleted";
    pub const NODE_FAILED: &str = "NodeFailed";
    pub const WORKFLOW_COMPLETED: &str = "WorkflowCompleted";
    pub const WORKFLOW_FAILED: &str = "WorkflowFailed";
}

/// Emitted by a receiver on `operion.trigger` whenever its source fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub id: String,
    pub source_id: String,
    pub provider_id: String,
    pub event_type: String,
    pub data: Value,
    pub emitted_at: DateTime<Utc>,
}

/// Emitted by the dispatcher on `operion.events` per matching trigger node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTriggered {
    pub execution_id: ExecutionId,
    pub published_workflow_id: WorkflowId,
    pub trigger_node_id: String,
    pub trigger_data: Value,
    pub correlation_id: String,
}

/// Emitted by a worker once a node finishes successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCompleted {
    pub execution_id: ExecutionId,
    pub node_id: String,
    pub results: HashMap<String, NodeResult>,
}

/// Emitted by a worker when a node's execution fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeFailed {
    pub execution_id: ExecutionId,
    pub node_id: String,
    pub error: String,
}

/// Emitted once an execution has no more pending work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowCompleted {
    pub execution_id: ExecutionId,
}

/// Emitted when an execution terminates without completing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowFailed {
    pub execution_id: ExecutionId,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_completed_round_trips_through_json() {
        let mut data = HashMap::new();
        data.insert("success".to_string(), serde_json::json!({"ok": true}));
        let event = NodeCompleted {
            execution_id: ExecutionId::v4(),
            node_id: "n1".to_string(),
            results: HashMap::from([("success".to_string(), NodeResult::success("n1", data))]),
        };
        let value = serde_json::to_value(&event).unwrap();
        let back: NodeCompleted = serde_json::from_value(value).unwrap();
        assert_eq!(back.node_id, "n1");
        assert_eq!(back.execution_id, event.execution_id);
    }
}
