use std::collections::HashMap;
use std::sync::Arc;

use nebula_core::{ExecutionId, NodeId, NodeResult, WorkflowId};
use tokio_util::sync::CancellationToken;

use crate::error::ActionError;

/// Runtime context provided to every node during execution.
///
/// Constructed by the worker before invoking a node. Carries identity
/// information (which execution, workflow, and node this is), the
/// execution's frozen variables (copied from the workflow at start — see
/// spec `ExecutionContext.variables`), the data that triggered the
/// execution and every node's result recorded so far (both copied from
/// `ExecutionContext` at schedule time), and a cancellation token nodes
/// use for cooperative cancellation during long-running work (e.g. the
/// HTTP node's in-flight request).
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub execution_id: ExecutionId,
    pub node_id: NodeId,
    pub workflow_id: WorkflowId,
    pub cancellation: CancellationToken,
    variables: Arc<serde_json::Map<String, serde_json::Value>>,
    trigger_data: Arc<serde_json::Value>,
    node_results: Arc<HashMap<String, NodeResult>>,
}

impl ActionContext {
    pub fn new(execution_id: ExecutionId, node_id: NodeId, workflow_id: WorkflowId) -> Self {
        Self {
            execution_id,
            node_id,
            workflow_id,
            cancellation: CancellationToken::new(),
            variables: Arc::new(serde_json::Map::new()),
            trigger_data: Arc::new(serde_json::Value::Null),
            node_results: Arc::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn with_variables(mut self, vars: serde_json::Map<String, serde_json::Value>) -> Self {
        self.variables = Arc::new(vars);
        self
    }

    /// Sets the data that triggered this execution, exposed to nodes as
    /// `$trigger_data`.
    #[must_use]
    pub fn with_trigger_data(mut self, trigger_data: serde_json::Value) -> Self {
        self.trigger_data = Arc::new(trigger_data);
        self
    }

    /// Sets every node's result recorded so far in this execution,
    /// exposed to nodes as `$node_results.<id>.<port>`.
    #[must_use]
    pub fn with_node_results(mut self, node_results: HashMap<String, NodeResult>) -> Self {
        self.node_results = Arc::new(node_results);
        self
    }

    pub fn variable(&self, key: &str) -> Option<&serde_json::Value> {
        self.variables.get(key)
    }

    pub fn variables(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.variables
    }

    pub fn trigger_data(&self) -> &serde_json::Value {
        &self.trigger_data
    }

    pub fn node_results(&self) -> &HashMap<String, NodeResult> {
        &self.node_results
    }

    /// Returns `Err(ActionError::Cancelled)` if the execution has been
    /// cancelled. Nodes doing long-running work should call this
    /// periodically.
    pub fn check_cancelled(&self) -> Result<(), ActionError> {
        if self.cancellation.is_cancelled() {
            Err(ActionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> ActionContext {
        ActionContext::new(
            ExecutionId::v4(),
            NodeId::new("n1").unwrap(),
            WorkflowId::v4(),
        )
    }

    #[test]
    fn variables_default_to_empty() {
        let ctx = test_context();
        assert!(ctx.variable("count").is_none());
    }

    #[test]
    fn with_variables_populates_lookup() {
        let mut vars = serde_json::Map::new();
        vars.insert("env".into(), serde_json::json!("prod"));
        let ctx = test_context().with_variables(vars);
        assert_eq!(ctx.variable("env"), Some(&serde_json::json!("prod")));
    }

    #[test]
    fn trigger_data_defaults_to_null_and_is_settable() {
        let ctx = test_context();
        assert_eq!(ctx.trigger_data(), &serde_json::Value::Null);

        let ctx = ctx.with_trigger_data(serde_json::json!({ "user_id": 7 }));
        assert_eq!(ctx.trigger_data()["user_id"], 7);
    }

    #[test]
    fn node_results_default_to_empty_and_are_settable() {
        let ctx = test_context();
        assert!(ctx.node_results().is_empty());

        let mut results = std::collections::HashMap::new();
        results.insert("upstream".to_string(), nebula_core::NodeResult::success("upstream", Default::default()));
        let ctx = ctx.with_node_results(results);
        assert!(ctx.node_results().contains_key("upstream"));
    }

    #[test]
    fn check_cancelled_ok_by_default() {
        let ctx = test_context();
        assert!(ctx.check_cancelled().is_ok());
    }

    #[test]
    fn check_cancelled_after_cancel() {
        let ctx = test_context();
        ctx.cancellation.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(ActionError::Cancelled)));
    }

    #[test]
    fn with_cancellation_shares_parent_token() {
        let token = CancellationToken::new();
        let child = token.child_token();
        let ctx = test_context().with_cancellation(child);
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(ctx.check_cancelled().is_err());
    }
}
