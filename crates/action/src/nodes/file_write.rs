//! `file.write` — writes pretty-printed JSON to disk. Per spec: config is
//! `file_name`, `directory` (default `/tmp`), `overwrite`, and an optional
//! `input` expression selecting what to write; if `overwrite` is false and
//! the target file already exists, the node fails.

use std::collections::HashMap;
use std::path::PathBuf;
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

pub const TYPE_KEY: &str = "file.write";

fn default_directory() -> String {
    "/tmp".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct FileWriteConfig {
    file_name: String,
    #[serde(default = "default_directory")]
    directory: String,
    #[serde(default)]
    overwrite: bool,
    #[serde(default)]
    input: Option<String>,
}

fn parse_config(config: &Value) -> Result<FileWriteConfig, ActionError> {
    serde_json::from_value(config.clone())
        .map_err(|e| ActionError::validation(format!("invalid file.write config: {e}")))
}

pub struct FileWriteNode {
    id: NodeId,
    node_type: NodeTypeKey,
    config: FileWriteConfig,
    engine: Arc<ExpressionEngine>,
}

#[async_trait]
impl Node for FileWriteNode {
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

        let payload = if let Some(input_expr) = &self.config.input {
            let resolved = self
                .engine
                .evaluate(input_expr, &ectx)
                .map_err(|e| ActionError::fatal(format!("file.write input render failed: {e}")))?;
            ectx.set_input(resolved.clone());
            resolved
        } else {
            ectx.get_input().as_ref().clone()
        };

        let directory = PathBuf::from(&self.config.directory);
        let path = directory.join(&self.config.file_name);

        if !self.config.overwrite && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ActionError::fatal(format!("file already exists: {}", path.display())));
        }

        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| ActionError::retryable(format!("failed to create directory {}: {e}", directory.display())))?;

        let body = serde_json::to_string_pretty(&payload)
            .map_err(|e| ActionError::fatal(format!("failed to serialize output: {e}")))?;

        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| ActionError::retryable(format!("failed to write {}: {e}", path.display())))?;

        Ok(NodeOutput::single(
            "success",
            serde_json::json!({
                "file_path": path.display().to_string(),
                "bytes_written": body.len(),
                "success": true,
            }),
        ))
    }
}

struct FileWriteFactory;

impl NodeFactory for FileWriteFactory {
    fn create(&self, id: NodeId, config: Value) -> Result<Box<dyn Node>, ActionError> {
        let config = parse_config(&config)?;
        Ok(Box::new(FileWriteNode {
            id,
            node_type: NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"),
            config,
            engine: Arc::new(ExpressionEngine::new()),
        }))
    }

    fn schema(&self) -> Option<Value> {
        Some(serde_json::json!({
            "type": "object",
            "required": ["file_name"],
            "properties": {
                "file_name": { "type": "string" },
                "directory": { "type": "string" },
                "overwrite": { "type": "boolean" },
                "input": { "type": "string" }
            }
        }))
    }
}

pub fn register(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry
        .register(NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"), Arc::new(FileWriteFactory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::{ExecutionId, WorkflowId};

    fn node(file_name: &str, directory: &str, overwrite: bool, input: Option<&str>) -> FileWriteNode {
        FileWriteNode {
            id: NodeId::new("n1").unwrap(),
            node_type: NodeTypeKey::new(TYPE_KEY).unwrap(),
            config: FileWriteConfig {
                file_name: file_name.into(),
                directory: directory.into(),
                overwrite,
                input: input.map(str::to_string),
            },
            engine: Arc::new(ExpressionEngine::new()),
        }
    }

    fn ctx() -> ActionContext {
        ActionContext::new(ExecutionId::v4(), NodeId::new("n1").unwrap(), WorkflowId::v4())
    }

    #[tokio::test]
    async fn writes_pretty_json_and_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        let node = node("out.json", sub.to_str().unwrap(), true, Some("$execution.variables"));

        let mut ctx = ctx();
        let mut vars = serde_json::Map::new();
        vars.insert("env".to_string(), serde_json::json!("prod"));
        ctx = ctx.with_variables(vars);

        let out = node.execute(&ctx, HashMap::new()).await.unwrap();
        let payload = out.get("success").unwrap();
        assert_eq!(payload["success"], true);

        let written = tokio::fs::read_to_string(sub.join("out.json")).await.unwrap();
        assert!(written.contains("\"env\": \"prod\""));
    }

    #[tokio::test]
    async fn refuses_to_overwrite_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.json");
        tokio::fs::write(&path, "{}").await.unwrap();

        let node = node("exists.json", dir.path().to_str().unwrap(), false, None);
        let err = node.execute(&ctx(), HashMap::new()).await.unwrap_err();
        assert!(matches!(err, ActionError::Fatal { .. }));
    }

    #[tokio::test]
    async fn overwrite_true_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.json");
        tokio::fs::write(&path, "{}").await.unwrap();

        let node = node("exists.json", dir.path().to_str().unwrap(), true, None);
        let out = node.execute(&ctx(), HashMap::new()).await.unwrap();
        assert!(out.get("success").is_some());
    }
}
