//! `transform` — resolves an optional `input` expression against the
//! node's received inputs, then evaluates `expression` against that data.
//! Per spec: "Resolves `input` against the node results if given, else
//! uses the full results map; then renders `expression` against that
//! data."

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nebula_core::{InputRequirements, NodeId, NodeResult, NodeTypeKey};
use nebula_expression::ExpressionEngine;
use serde::Deserialize;
use serde_json::Value;

use crate::context::ActionContext;
use crate::error::ActionError;
use crate::node::{Node, NodeFactory};
use crate::port::{InputPort, OutputPort, PortKey, ERROR_PORT};
use crate::registry::{NodeRegistry, RegistryError};
use crate::result::NodeOutput;

pub const TYPE_KEY: &str = "transform";

#[derive(Debug, Clone, Deserialize)]
struct TransformConfig {
    #[serde(default)]
    input: Option<String>,
    expression: String,
}

fn parse_config(config: &Value) -> Result<TransformConfig, ActionError> {
    serde_json::from_value(config.clone())
        .map_err(|e| ActionError::validation(format!("invalid transform config: {e}")))
}

pub struct TransformNode {
    id: NodeId,
    node_type: NodeTypeKey,
    config: TransformConfig,
    engine: Arc<ExpressionEngine>,
}

#[async_trait]
impl Node for TransformNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn node_type(&self) -> &NodeTypeKey {
        &self.node_type
    }

    fn input_ports(&self) -> Vec<InputPort> {
        vec![InputPort::optional("in")]
    }

    fn output_ports(&self) -> Vec<OutputPort> {
        vec![OutputPort::new("success"), OutputPort::error(ERROR_PORT)]
    }

    fn input_requirements(&self) -> InputRequirements {
        InputRequirements::new(vec![])
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
        let mut ectx = super::build_context(ctx, &inputs);

        if let Some(input_expr) = &self.config.input {
            let resolved = self
                .engine
                .evaluate(input_expr, &ectx)
                .map_err(|e| ActionError::fatal(format!("transform input render failed: {e}")))?;
            ectx.set_input(resolved);
        }

        let value = self
            .engine
            .evaluate(&self.config.expression, &ectx)
            .map_err(|e| ActionError::fatal(format!("transform expression failed: {e}")))?;

        Ok(NodeOutput::single("success", value))
    }
}

struct TransformFactory;

impl NodeFactory for TransformFactory {
    fn create(&self, id: NodeId, config: Value) -> Result<Box<dyn Node>, ActionError> {
        let config = parse_config(&config)?;
        Ok(Box::new(TransformNode {
            id,
            node_type: NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"),
            config,
            engine: Arc::new(ExpressionEngine::new()),
        }))
    }

    fn schema(&self) -> Option<Value> {
        Some(serde_json::json!({
            "type": "object",
            "required": ["expression"],
            "properties": {
                "input": { "type": "string" },
                "expression": { "type": "string" }
            }
        }))
    }
}

pub fn register(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry.register(NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"), Arc::new(TransformFactory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::{ExecutionId, WorkflowId};

    fn node(input: Option<&str>, expression: &str) -> TransformNode {
        TransformNode {
            id: NodeId::new("n1").unwrap(),
            node_type: NodeTypeKey::new(TYPE_KEY).unwrap(),
            config: TransformConfig { input: input.map(str::to_string), expression: expression.into() },
            engine: Arc::new(ExpressionEngine::new()),
        }
    }

    fn ctx() -> ActionContext {
        ActionContext::new(ExecutionId::v4(), NodeId::new("n1").unwrap(), WorkflowId::v4())
    }

    #[tokio::test]
    async fn evaluates_expression_against_full_inputs_by_default() {
        let node = node(None, "$input.name");
        let mut data = HashMap::new();
        data.insert("name".to_string(), Value::String("Ada".into()));
        let mut inputs = HashMap::new();
        inputs.insert("webhook".to_string(), NodeResult::success("webhook", data));

        let out = node.execute(&ctx(), inputs).await.unwrap();
        assert_eq!(out.get("success"), Some(&Value::String("Ada".into())));
    }

    #[tokio::test]
    async fn resolves_narrowed_input_expression_first() {
        let node = node(Some("$node.webhook.name"), "$input");
        let mut data = HashMap::new();
        data.insert("name".to_string(), Value::String("Grace".into()));
        let mut inputs = HashMap::new();
        inputs.insert("webhook".to_string(), NodeResult::success("webhook", data));

        let out = node.execute(&ctx(), inputs).await.unwrap();
        assert_eq!(out.get("success"), Some(&Value::String("Grace".into())));
    }

    #[tokio::test]
    async fn render_failure_is_fatal() {
        let node = node(None, "$input.");
        let out = node.execute(&ctx(), HashMap::new()).await;
        assert!(matches!(out, Err(ActionError::Fatal { .. })));
    }

    #[test]
    fn rejects_missing_expression() {
        let err = TransformFactory.create(NodeId::new("n1").unwrap(), serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }
}
