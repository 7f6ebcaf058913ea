//! `log` — renders a templated message and emits it at a configurable
//! level. Per spec: config is `message` (templated) and an optional
//! `level` in `{debug, info, warn, error}` (default `info`).

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

pub const TYPE_KEY: &str = "log";

#[derive(Debug, Clone, Deserialize)]
struct LogConfig {
    message: String,
    #[serde(default)]
    level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

fn parse_config(config: &Value) -> Result<LogConfig, ActionError> {
    serde_json::from_value(config.clone())
        .map_err(|e| ActionError::validation(format!("invalid log config: {e}")))
}

pub struct LogNode {
    id: NodeId,
    node_type: NodeTypeKey,
    config: LogConfig,
    engine: Arc<ExpressionEngine>,
}

#[async_trait]
impl Node for LogNode {
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
        let ectx = super::build_context(ctx, &inputs);
        let message = super::render_template_str(&self.config.message, &self.engine, &ectx)
            .map_err(|e| ActionError::fatal(format!("log message render failed: {e}")))?;

        match self.config.level {
            LogLevel::Debug => tracing::debug!(node_id = %self.id, "{message}"),
            LogLevel::Info => tracing::info!(node_id = %self.id, "{message}"),
            LogLevel::Warn => tracing::warn!(node_id = %self.id, "{message}"),
            LogLevel::Error => tracing::error!(node_id = %self.id, "{message}"),
        }

        Ok(NodeOutput::single(
            "success",
            serde_json::json!({ "message": message, "level": self.config.level.as_str() }),
        ))
    }
}

struct LogFactory;

impl NodeFactory for LogFactory {
    fn create(&self, id: NodeId, config: Value) -> Result<Box<dyn Node>, ActionError> {
        let config = parse_config(&config)?;
        Ok(Box::new(LogNode {
            id,
            node_type: NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"),
            config,
            engine: Arc::new(ExpressionEngine::new()),
        }))
    }

    fn schema(&self) -> Option<Value> {
        Some(serde_json::json!({
            "type": "object",
            "required": ["message"],
            "properties": {
                "message": { "type": "string" },
                "level": { "type": "string", "enum": ["debug", "info", "warn", "error"] }
            }
        }))
    }
}

pub fn register(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry.register(NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"), Arc::new(LogFactory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::{ExecutionId, WorkflowId};

    fn node(message: &str, level: Option<&str>) -> LogNode {
        let mut config = serde_json::json!({ "message": message });
        if let Some(level) = level {
            config["level"] = serde_json::json!(level);
        }
        LogNode {
            id: NodeId::new("n1").unwrap(),
            node_type: NodeTypeKey::new(TYPE_KEY).unwrap(),
            config: parse_config(&config).unwrap(),
            engine: Arc::new(ExpressionEngine::new()),
        }
    }

    fn ctx() -> ActionContext {
        ActionContext::new(ExecutionId::v4(), NodeId::new("n1").unwrap(), WorkflowId::v4())
    }

    #[test]
    fn defaults_to_info_level() {
        let node = node("hello", None);
        assert_eq!(node.config.level, LogLevel::Info);
    }

    #[tokio::test]
    async fn renders_templated_message() {
        let node = node("static message", Some("warn"));
        let out = node.execute(&ctx(), HashMap::new()).await.unwrap();
        let payload = out.get("success").unwrap();
        assert_eq!(payload["message"], "static message");
        assert_eq!(payload["level"], "warn");
    }

    #[test]
    fn rejects_missing_message() {
        let err = LogFactory.create(NodeId::new("n1").unwrap(), serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }
}
