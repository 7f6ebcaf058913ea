use std::collections::HashMap;

use async_trait::async_trait;
use nebula_core::{InputRequirements, NodeId, NodeResult, NodeTypeKey};
use serde_json::Value;

use crate::context::ActionContext;
use crate::error::ActionError;
use crate::port::{InputPort, OutputPort, PortKey};
use crate::result::NodeOutput;

/// The contract every node type in the graph implements.
///
/// A `Node` instance is built by a registry factory from a
/// `WorkflowNode.config`; it is immutable and safe to share across
/// concurrent executions (the engine holds it behind `Arc<dyn Node>`).
#[async_trait]
pub trait Node: Send + Sync {
    /// The id of the `WorkflowNode` this instance was built from.
    fn id(&self) -> &NodeId;

    /// The registry key this node was created from (e.g. `"http.request"`).
    fn node_type(&self) -> &NodeTypeKey;

    fn input_ports(&self) -> Vec<InputPort>;

    fn output_ports(&self) -> Vec<OutputPort>;

    /// How the input coordinator should wait for this node's inputs
    /// before scheduling it.
    fn input_requirements(&self) -> InputRequirements;

    /// Validates a candidate `config` value before a node instance is
    /// built from it. Called by the registry at workflow-save time and
    /// again by the factory before construction.
    fn validate(&self, config: &Value) -> Result<(), ActionError>;

    /// Executes the node given its resolved inputs, returning the
    /// values produced on each output port.
    ///
    /// `inputs` maps input-port name to the upstream `NodeResult` that
    /// satisfied it. Implementations that fail should prefer
    /// [`ActionError::Retryable`] for transient conditions (network
    /// timeouts) and [`ActionError::Fatal`] otherwise; the worker routes
    /// either to the node's `error` output port if one exists.
    async fn execute(
        &self,
        ctx: &ActionContext,
        inputs: HashMap<PortKey, NodeResult>,
    ) -> Result<NodeOutput, ActionError>;
}

/// Builds a `Node` instance from a workflow node's id and opaque JSON
/// config. Registered against a type key in the [`crate::registry::NodeRegistry`].
pub trait NodeFactory: Send + Sync {
    fn create(&self, id: NodeId, config: Value) -> Result<Box<dyn Node>, ActionError>;

    /// JSON Schema describing valid `config` values, if the node type
    /// publishes one.
    fn schema(&self) -> Option<Value> {
        None
    }
}

impl<F> NodeFactory for F
where
    F: Fn(NodeId, Value) -> Result<Box<dyn Node>, ActionError> + Send + Sync,
{
    fn create(&self, id: NodeId, config: Value) -> Result<Box<dyn Node>, ActionError> {
        self(id, config)
    }
}
