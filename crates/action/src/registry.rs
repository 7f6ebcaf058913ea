use std::collections::HashMap;
use std::sync::Arc;

use nebula_core::{NodeId, NodeTypeKey};
use serde_json::Value;
use thiserror::Error;

use crate::error::ActionError;
use crate::node::{Node, NodeFactory};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown node type: {0}")]
    UnknownType(NodeTypeKey),

    #[error("node type {type_key} already registered")]
    AlreadyRegistered { type_key: NodeTypeKey },

    /// `type_key` is registered, but its factory rejected the given id/config
    /// (e.g. a config validation failure). Distinct from `UnknownType` so
    /// callers can tell "no such node type" from "this node type's config is
    /// invalid."
    #[error("failed to construct node of type {type_key}: {source}")]
    Construction { type_key: NodeTypeKey, source: ActionError },
}

/// Process-wide registry of node-type factories.
///
/// Read-mostly after startup: `register` is called during initialization
/// (and, per the spec, may also be called at runtime to load additional
/// factories — hot-reload of an already-registered key is not supported).
/// Trigger-node and action/control-node factories share this same
/// contract; callers keep two separate `NodeRegistry` instances, one per
/// subregistry.
#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<NodeTypeKey, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `type_key`. Returns an error if a
    /// factory is already registered under that key.
    pub fn register(
        &mut self,
        type_key: NodeTypeKey,
        factory: Arc<dyn NodeFactory>,
    ) -> Result<(), RegistryError> {
        if self.factories.contains_key(&type_key) {
            return Err(RegistryError::AlreadyRegistered { type_key });
        }
        self.factories.insert(type_key, factory);
        Ok(())
    }

    /// Builds a node instance of `type_key` with the given id and config.
    pub fn create(
        &self,
        type_key: &NodeTypeKey,
        id: NodeId,
        config: Value,
    ) -> Result<Box<dyn Node>, RegistryError> {
        let factory = self
            .factories
            .get(type_key)
            .ok_or_else(|| RegistryError::UnknownType(type_key.clone()))?;
        factory
            .create(id, config)
            .map_err(|source| RegistryError::Construction { type_key: type_key.clone(), source })
    }

    /// Returns the JSON Schema for `type_key`'s config, if published.
    pub fn schema(&self, type_key: &NodeTypeKey) -> Option<Value> {
        self.factories.get(type_key)?.schema()
    }

    pub fn contains(&self, type_key: &NodeTypeKey) -> bool {
        self.factories.contains_key(type_key)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn type_keys(&self) -> impl Iterator<Item = &NodeTypeKey> {
        self.factories.keys()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("count", &self.factories.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ActionContext;
    use crate::error::ActionError;
    use crate::port::{default_input_ports, default_output_ports, InputPort, OutputPort};
    use crate::result::NodeOutput;
    use async_trait::async_trait;
    use nebula_core::{ExecutionId, InputRequirements, NodeResult, WorkflowId};
    use std::collections::HashMap as Map;

    struct NoOp {
        id: NodeId,
        node_type: NodeTypeKey,
    }

    #[async_trait]
    impl Node for NoOp {
        fn id(&self) -> &NodeId {
            &self.id
        }
        fn node_type(&self) -> &NodeTypeKey {
            &self.node_type
        }
        fn input_ports(&self) -> Vec<InputPort> {
            default_input_ports()
        }
        fn output_ports(&self) -> Vec<OutputPort> {
            default_output_ports()
        }
        fn input_requirements(&self) -> InputRequirements {
            InputRequirements::new(vec![])
        }
        fn validate(&self, _config: &Value) -> Result<(), ActionError> {
            Ok(())
        }
        async fn execute(
            &self,
            _ctx: &ActionContext,
            _inputs: Map<String, NodeResult>,
        ) -> Result<NodeOutput, ActionError> {
            Ok(NodeOutput::main(Value::Null))
        }
    }

    fn noop_factory() -> Arc<dyn NodeFactory> {
        Arc::new(|id: NodeId, _config: Value| -> Result<Box<dyn Node>, ActionError> {
            Ok(Box::new(NoOp { id, node_type: NodeTypeKey::new("noop").unwrap() }))
        })
    }

    fn type_key(s: &str) -> NodeTypeKey {
        NodeTypeKey::new(s).unwrap()
    }

    #[test]
    fn empty_registry_has_no_types() {
        let registry = NodeRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.contains(&type_key("noop")));
    }

    #[test]
    fn register_and_create() {
        let mut registry = NodeRegistry::new();
        registry.register(type_key("noop"), noop_factory()).unwrap();

        let node = registry
            .create(&type_key("noop"), NodeId::new("n1").unwrap(), Value::Null)
            .unwrap();
        assert_eq!(node.node_type().as_str(), "noop");
    }

    #[test]
    fn create_unknown_type_fails() {
        let registry = NodeRegistry::new();
        let err = registry
            .create(&type_key("missing"), NodeId::new("n1").unwrap(), Value::Null)
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownType(_)));
    }

    #[test]
    fn create_with_invalid_config_reports_construction_not_unknown_type() {
        let mut registry = NodeRegistry::new();
        let factory: Arc<dyn NodeFactory> =
            Arc::new(|_id: NodeId, _config: Value| -> Result<Box<dyn Node>, ActionError> {
                Err(ActionError::validation("bad config"))
            });
        registry.register(type_key("noop"), factory).unwrap();

        let err = registry
            .create(&type_key("noop"), NodeId::new("n1").unwrap(), Value::Null)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Construction { source: ActionError::Validation(_), .. }));
    }

    #[test]
    fn double_register_same_key_fails() {
        let mut registry = NodeRegistry::new();
        registry.register(type_key("noop"), noop_factory()).unwrap();
        let err = registry.register(type_key("noop"), noop_factory()).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
    }

    #[tokio::test]
    async fn created_node_executes() {
        let mut registry = NodeRegistry::new();
        registry.register(type_key("noop"), noop_factory()).unwrap();
        let node = registry
            .create(&type_key("noop"), NodeId::new("n1").unwrap(), Value::Null)
            .unwrap();

        let ctx = ActionContext::new(ExecutionId::v4(), NodeId::new("n1").unwrap(), WorkflowId::v4());
        let out = node.execute(&ctx, Map::new()).await.unwrap();
        assert_eq!(out.get("main"), Some(&Value::Null));
    }
}
