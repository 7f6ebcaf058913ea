//! Shared domain types that cross crate boundaries: the shape of a node's
//! result and the input-matching rules a node declares. Kept here (rather
//! than in `nebula-action` or `nebula-execution`) because the persistence,
//! execution, and action-runtime crates all need the same definitions
//! without depending on each other.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::keys::PortName;
use crate::id::{ExecutionId, WorkflowId};

/// Outcome of a single node's execution, as recorded against an
/// `ExecutionContext`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeResultStatus {
    Success,
    Error,
    Skipped,
}

/// Per-node outcome of one execution attempt.
///
/// `data` maps output-port name to the JSON value produced on that port;
/// for a synthetic result built from an upstream node's single output
/// (the common case when feeding a downstream node's input port), it
/// holds exactly one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    pub node_id: String,
    pub data: HashMap<String, Value>,
    pub status: NodeResultStatus,
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl NodeResult {
    pub fn success(node_id: impl Into<String>, data: HashMap<String, Value>) -> Self {
        Self {
            node_id: node_id.into(),
            data,
            status: NodeResultStatus::Success,
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error(node_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            data: HashMap::new(),
            status: NodeResultStatus::Error,
            error: Some(error.into()),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn skipped(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            data: HashMap::new(),
            status: NodeResultStatus::Skipped,
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// The value produced on a single port, for nodes that only ever
    /// emit one entry (the common case for synthetic per-connection
    /// results built by the worker).
    pub fn port(&self, port: &str) -> Option<&Value> {
        self.data.get(port)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, NodeResultStatus::Success)
    }
}

/// How an `InputRequirements` set is satisfied once multiple inputs are
/// pending for the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitMode {
    /// Every required port (and, if present, every optional port that has
    /// fired) must have arrived.
    All,
    /// Any single required port firing is enough.
    Any,
    /// Only the first input to arrive matters; later arrivals are ignored.
    First,
}

/// Declares which input ports a node needs before it can execute, and how
/// to treat partial arrival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRequirements {
    pub required_ports: Vec<PortName>,
    pub optional_ports: Vec<PortName>,
    pub wait_mode: WaitMode,
    pub timeout: Option<std::time::Duration>,
}

impl InputRequirements {
    pub fn new(required_ports: Vec<PortName>) -> Self {
        Self { required_ports, optional_ports: Vec::new(), wait_mode: WaitMode::All, timeout: None }
    }

    #[must_use]
    pub fn with_optional_ports(mut self, ports: Vec<PortName>) -> Self {
        self.optional_ports = ports;
        self
    }

    #[must_use]
    pub fn with_wait_mode(mut self, mode: WaitMode) -> Self {
        self.wait_mode = mode;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Lifecycle state of an `ExecutionContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A single workflow execution: the mutable record the worker updates
/// as nodes complete. Created by the worker on `WorkflowTriggered`,
/// mutated only via the persistence layer's upsert, and otherwise
/// immutable for the run's duration (`variables` are frozen at start).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub id: ExecutionId,
    pub published_workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub trigger_data: Value,
    pub variables: HashMap<String, Value>,
    pub node_results: HashMap<String, NodeResult>,
    pub metadata: HashMap<String, Value>,
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ExecutionContext {
    pub fn new(
        id: ExecutionId,
        published_workflow_id: WorkflowId,
        trigger_data: Value,
        variables: HashMap<String, Value>,
    ) -> Self {
        Self {
            id,
            published_workflow_id,
            status: ExecutionStatus::Running,
            trigger_data,
            variables,
            node_results: HashMap::new(),
            metadata: HashMap::new(),
            error_message: None,
            created_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, ExecutionStatus::Running)
    }

    /// Merges a node's result into `node_results`, as the worker does
    /// on every `NodeCompleted`/`NodeFailed` event.
    pub fn record_result(&mut self, node_id: impl Into<String>, result: NodeResult) {
        self.node_results.insert(node_id.into(), result);
    }

    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(chrono::Utc::now());
    }

    pub fn fail(&mut self, error_message: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.error_message = Some(error_message.into());
        self.completed_at = Some(chrono::Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = ExecutionStatus::Cancelled;
        self.completed_at = Some(chrono::Utc::now());
    }
}

/// Per-attempt tracking of inputs arriving for one node within one
/// execution. Created on first input arrival, updated on each
/// subsequent one, deleted when the node fires or is expired by the
/// retention sweep (`InputCoordinationRepository::cleanup_expired`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInputState {
    pub node_id: String,
    pub execution_id: ExecutionId,
    /// Unique per attempt — supports loops/re-entry of the same node
    /// within one execution.
    pub node_execution_id: uuid::Uuid,
    pub received_inputs: HashMap<String, NodeResult>,
    pub requirements: InputRequirements,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_updated_at: chrono::DateTime<chrono::Utc>,
}

impl NodeInputState {
    pub fn new(
        node_id: impl Into<String>,
        execution_id: ExecutionId,
        requirements: InputRequirements,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            node_id: node_id.into(),
            execution_id,
            node_execution_id: uuid::Uuid::new_v4(),
            received_inputs: HashMap::new(),
            requirements,
            created_at: now,
            last_updated_at: now,
        }
    }

    /// Records an input on `port`, returning whether the node is now
    /// ready to fire under its declared `wait_mode`.
    pub fn receive(&mut self, port: impl Into<String>, result: NodeResult) -> bool {
        let port = port.into();
        if self.requirements.wait_mode == WaitMode::First && !self.received_inputs.is_empty() {
            // First-arrival wins; later inputs are ignored.
            return self.is_ready();
        }
        self.received_inputs.insert(port, result);
        self.last_updated_at = chrono::Utc::now();
        self.is_ready()
    }

    pub fn is_ready(&self) -> bool {
        match self.requirements.wait_mode {
            WaitMode::All => self
                .requirements
                .required_ports
                .iter()
                .all(|p| self.received_inputs.contains_key(p.as_str())),
            WaitMode::Any => self
                .requirements
                .required_ports
                .iter()
                .any(|p| self.received_inputs.contains_key(p.as_str())),
            WaitMode::First => self
                .requirements
                .required_ports
                .iter()
                .any(|p| self.received_inputs.contains_key(p.as_str())),
        }
    }

    pub fn is_expired(&self, max_age: std::time::Duration) -> bool {
        let age = chrono::Utc::now() - self.created_at;
        age.to_std().map(|age| age > max_age).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_result_success_has_no_error() {
        let result = NodeResult::success("n1", HashMap::new());
        assert!(result.is_success());
        assert!(result.error.is_none());
    }

    #[test]
    fn node_result_error_carries_message() {
        let result = NodeResult::error("n1", "boom");
        assert!(!result.is_success());
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn node_result_port_reads_named_entry() {
        let mut data = HashMap::new();
        data.insert("main".to_string(), Value::from(42));
        let result = NodeResult::success("n1", data);
        assert_eq!(result.port("main"), Some(&Value::from(42)));
        assert_eq!(result.port("missing"), None);
    }

    #[test]
    fn input_requirements_default_wait_mode_is_all() {
        let reqs = InputRequirements::new(vec![PortName::new("in").unwrap()]);
        assert_eq!(reqs.wait_mode, WaitMode::All);
        assert!(reqs.optional_ports.is_empty());
        assert!(reqs.timeout.is_none());
    }

    #[test]
    fn wait_mode_first_only_fires_on_required_port() {
        let reqs = InputRequirements::new(vec![PortName::new("a").unwrap()]).with_wait_mode(WaitMode::First);
        let mut state = NodeInputState::new("n1", ExecutionId::v4(), reqs);
        state.received_inputs.insert("other".to_string(), NodeResult::success("up", HashMap::new()));
        assert!(!state.is_ready());

        state.received_inputs.insert("a".to_string(), NodeResult::success("up", HashMap::new()));
        assert!(state.is_ready());
    }

    #[test]
    fn input_requirements_builder_chains() {
        let reqs = InputRequirements::new(vec![PortName::new("a").unwrap()])
            .with_optional_ports(vec![PortName::new("b").unwrap()])
            .with_wait_mode(WaitMode::Any)
            .with_timeout(std::time::Duration::from_secs(30));

        assert_eq!(reqs.wait_mode, WaitMode::Any);
        assert_eq!(reqs.optional_ports.len(), 1);
        assert_eq!(reqs.timeout, Some(std::time::Duration::from_secs(30)));
    }
}
