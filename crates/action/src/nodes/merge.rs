//! `merge` — fans in two or more named input ports and emits their
//! combined data on a single `merged` output. `merge_mode` controls the
//! wait strategy the input coordinator uses before scheduling this node
//! (`all`, `any`, or `first`); by the time `execute` runs, `inputs` already
//! reflects that mode (e.g. in `first` mode only the winning port is
//! present).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nebula_core::{InputRequirements, NodeId, NodeResult, NodeTypeKey, PortName, WaitMode};
use serde::Deserialize;
use serde_json::Value;

use crate::context::ActionContext;
use crate::error::ActionError;
use crate::node::{Node, NodeFactory};
use crate::port::{InputPort, OutputPort, PortKey, ERROR_PORT};
use crate::registry::{NodeRegistry, RegistryError};
use crate::result::NodeOutput;

pub const TYPE_KEY: &str = "merge";

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum MergeMode {
    #[default]
    All,
    Any,
    First,
}

impl MergeMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
            Self::First => "first",
        }
    }

    fn wait_mode(self) -> WaitMode {
        match self {
            Self::All => WaitMode::All,
            Self::Any => WaitMode::Any,
            Self::First => WaitMode::First,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MergeConfig {
    input_ports: Vec<String>,
    #[serde(default)]
    merge_mode: MergeMode,
}

fn parse_config(config: &Value) -> Result<MergeConfig, ActionError> {
    let config: MergeConfig = serde_json::from_value(config.clone())
        .map_err(|e| ActionError::validation(format!("invalid merge config: {e}")))?;
    if config.input_ports.len() < 2 {
        return Err(ActionError::validation("merge requires at least 2 input_ports"));
    }
    Ok(config)
}

pub struct MergeNode {
    id: NodeId,
    node_type: NodeTypeKey,
    config: MergeConfig,
}

#[async_trait]
impl Node for MergeNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn node_type(&self) -> &NodeTypeKey {
        &self.node_type
    }

    fn input_ports(&self) -> Vec<InputPort> {
        self.config.input_ports.iter().map(InputPort::new).collect()
    }

    fn output_ports(&self) -> Vec<OutputPort> {
        vec![OutputPort::new("merged"), OutputPort::error(ERROR_PORT)]
    }

    fn input_requirements(&self) -> InputRequirements {
        let ports: Vec<PortName> = self
            .config
            .input_ports
            .iter()
            .map(|p| PortName::new(p.clone()).expect("port name validated at construction"))
            .collect();
        InputRequirements::new(ports).with_wait_mode(self.config.merge_mode.wait_mode())
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        parse_config(config).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        inputs: HashMap<PortKey, NodeResult>,
    ) -> Result<NodeOutput, ActionError> {
        ctx.check_cancelled()?;

        let mut merged_inputs = serde_json::Map::with_capacity(inputs.len());
        for (port, result) in &inputs {
            merged_inputs.insert(port.clone(), serde_json::to_value(&result.data).unwrap_or(Value::Null));
        }

        Ok(NodeOutput::single(
            "merged",
            serde_json::json!({
                "merged_inputs": Value::Object(merged_inputs),
                "inputs_received": inputs.len(),
                "merge_mode": self.config.merge_mode.as_str(),
            }),
        ))
    }
}

struct MergeFactory;

impl NodeFactory for MergeFactory {
    fn create(&self, id: NodeId, config: Value) -> Result<Box<dyn Node>, ActionError> {
        let config = parse_config(&config)?;
        Ok(Box::new(MergeNode { id, node_type: NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"), config }))
    }

    fn schema(&self) -> Option<Value> {
        Some(serde_json::json!({
            "type": "object",
            "required": ["input_ports"],
            "properties": {
                "input_ports": { "type": "array", "items": { "type": "string" }, "minItems": 2 },
                "merge_mode": { "type": "string", "enum": ["all", "any", "first"] }
            }
        }))
    }
}

pub fn register(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry.register(NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"), Arc::new(MergeFactory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::{ExecutionId, WorkflowId};

    fn node(ports: &[&str], mode: MergeMode) -> MergeNode {
        MergeNode {
            id: NodeId::new("n1").unwrap(),
            node_type: NodeTypeKey::new(TYPE_KEY).unwrap(),
            config: MergeConfig { input_ports: ports.iter().map(|s| s.to_string()).collect(), merge_mode: mode },
        }
    }

    fn ctx() -> ActionContext {
        ActionContext::new(ExecutionId::v4(), NodeId::new("n1").unwrap(), WorkflowId::v4())
    }

    #[test]
    fn rejects_fewer_than_two_ports() {
        let err = MergeFactory
            .create(NodeId::new("n1").unwrap(), serde_json::json!({ "input_ports": ["a"] }))
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }

    #[test]
    fn requirements_mirror_merge_mode() {
        let node = node(&["a", "b"], MergeMode::Any);
        let reqs = node.input_requirements();
        assert_eq!(reqs.wait_mode, WaitMode::Any);
        assert_eq!(reqs.required_ports.len(), 2);
    }

    #[tokio::test]
    async fn merges_all_received_inputs() {
        let node = node(&["a", "b"], MergeMode::All);
        let mut data_a = HashMap::new();
        data_a.insert("x".to_string(), serde_json::json!(1));
        let mut data_b = HashMap::new();
        data_b.insert("y".to_string(), serde_json::json!(2));

        let mut inputs = HashMap::new();
        inputs.insert("a".to_string(), NodeResult::success("a", data_a));
        inputs.insert("b".to_string(), NodeResult::success("b", data_b));

        let out = node.execute(&ctx(), inputs).await.unwrap();
        let payload = out.get("merged").unwrap();
        assert_eq!(payload["inputs_received"], 2);
        assert_eq!(payload["merge_mode"], "all");
        assert_eq!(payload["merged_inputs"]["a"]["x"], 1);
        assert_eq!(payload["merged_inputs"]["b"]["y"], 2);
    }

    #[tokio::test]
    async fn first_mode_only_sees_winning_input() {
        let node = node(&["a", "b"], MergeMode::First);
        let mut data_a = HashMap::new();
        data_a.insert("x".to_string(), serde_json::json!(1));
        let mut inputs = HashMap::new();
        inputs.insert("a".to_string(), NodeResult::success("a", data_a));

        let out = node.execute(&ctx(), inputs).await.unwrap();
        let payload = out.get("merged").unwrap();
        assert_eq!(payload["inputs_received"], 1);
    }
}
