//! `conditional` — evaluates a templated `condition` and routes to the
//! `true` or `false` output port. Truthiness follows the spec's explicit
//! rules (distinct from the expression engine's general truthy coercion):
//! booleans as-is; strings parse as a bool if they look like one, else
//! non-empty is true; numbers are true if non-zero; sequences/mappings are
//! true if non-empty; null and anything else is false.

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

pub const TYPE_KEY: &str = "conditional";

#[derive(Debug, Clone, Deserialize)]
struct ConditionalConfig {
    condition: String,
}

fn parse_config(config: &Value) -> Result<ConditionalConfig, ActionError> {
    serde_json::from_value(config.clone())
        .map_err(|e| ActionError::validation(format!("invalid conditional config: {e}")))
}

/// `true`/`false` as a literal or a parseable string count; everything
/// else falls through to the generic per-type rule.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => match s.as_str() {
            "1" | "t" | "T" | "true" | "True" | "TRUE" => true,
            "0" | "f" | "F" | "false" | "False" | "FALSE" => false,
            _ => !s.is_empty(),
        },
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub struct ConditionalNode {
    id: NodeId,
    node_type: NodeTypeKey,
    config: ConditionalConfig,
    engine: Arc<ExpressionEngine>,
}

#[async_trait]
impl Node for ConditionalNode {
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
        vec![OutputPort::new("true"), OutputPort::new("false"), OutputPort::error(ERROR_PORT)]
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
        let ectx = super::build_context(ctx, &inputs);
        let evaluated = self
            .engine
            .evaluate(&self.config.condition, &ectx)
            .map_err(|e| ActionError::fatal(format!("condition evaluation failed: {e}")))?;

        let result = is_truthy(&evaluated);
        let port = if result { "true" } else { "false" };
        Ok(NodeOutput::single(port, serde_json::json!({ "condition": result })))
    }
}

struct ConditionalFactory;

impl NodeFactory for ConditionalFactory {
    fn create(&self, id: NodeId, config: Value) -> Result<Box<dyn Node>, ActionError> {
        let config = parse_config(&config)?;
        Ok(Box::new(ConditionalNode {
            id,
            node_type: NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"),
            config,
            engine: Arc::new(ExpressionEngine::new()),
        }))
    }

    fn schema(&self) -> Option<Value> {
        Some(serde_json::json!({
            "type": "object",
            "required": ["condition"],
            "properties": { "condition": { "type": "string" } }
        }))
    }
}

pub fn register(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry
        .register(NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"), Arc::new(ConditionalFactory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::{ExecutionId, WorkflowId};

    fn node(condition: &str) -> ConditionalNode {
        ConditionalNode {
            id: NodeId::new("n1").unwrap(),
            node_type: NodeTypeKey::new(TYPE_KEY).unwrap(),
            config: ConditionalConfig { condition: condition.into() },
            engine: Arc::new(ExpressionEngine::new()),
        }
    }

    fn ctx() -> ActionContext {
        ActionContext::new(ExecutionId::v4(), NodeId::new("n1").unwrap(), WorkflowId::v4())
    }

    #[test]
    fn string_true_parses_as_bool() {
        assert!(is_truthy(&Value::String("true".into())));
        assert!(!is_truthy(&Value::String("false".into())));
    }

    #[test]
    fn non_bool_string_falls_back_to_non_empty() {
        assert!(is_truthy(&Value::String("prod".into())));
        assert!(!is_truthy(&Value::String("".into())));
    }

    #[test]
    fn parse_bool_tokens_take_priority_over_non_empty_fallback() {
        for token in ["1", "t", "T", "true", "True", "TRUE"] {
            assert!(is_truthy(&Value::String(token.into())), "{token} should be truthy");
        }
        for token in ["0", "f", "F", "false", "False", "FALSE"] {
            assert!(!is_truthy(&Value::String(token.into())), "{token} should be falsy");
        }
    }

    #[test]
    fn zero_is_falsy_other_numbers_truthy() {
        assert!(!is_truthy(&serde_json::json!(0)));
        assert!(is_truthy(&serde_json::json!(1)));
        assert!(is_truthy(&serde_json::json!(-1.5)));
    }

    #[test]
    fn empty_collections_are_falsy() {
        assert!(!is_truthy(&serde_json::json!([])));
        assert!(!is_truthy(&serde_json::json!({})));
        assert!(is_truthy(&serde_json::json!([1])));
    }

    #[tokio::test]
    async fn routes_to_true_port() {
        let node = node("$execution.variables.env == \"prod\"");
        let mut ctx = ctx();
        let mut vars = serde_json::Map::new();
        vars.insert("env".to_string(), serde_json::json!("prod"));
        ctx = ctx.with_variables(vars);

        let out = node.execute(&ctx, HashMap::new()).await.unwrap();
        assert_eq!(out.get("true"), Some(&serde_json::json!({ "condition": true })));
        assert!(out.get("false").is_none());
    }

    #[tokio::test]
    async fn routes_to_false_port() {
        let node = node("$execution.variables.env == \"prod\"");
        let mut ctx = ctx();
        let mut vars = serde_json::Map::new();
        vars.insert("env".to_string(), serde_json::json!("staging"));
        ctx = ctx.with_variables(vars);

        let out = node.execute(&ctx, HashMap::new()).await.unwrap();
        assert_eq!(out.get("false"), Some(&serde_json::json!({ "condition": false })));
    }
}
