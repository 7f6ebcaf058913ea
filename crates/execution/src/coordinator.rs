//! Input coordinator (C10): collects partial inputs for a pending node
//! execution and decides when the node is ready to fire. Spec §4.9.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use nebula_core::{ExecutionId, InputRequirements, NodeResult, NodeResultStatus, WaitMode};
use nebula_storage::InputCoordinationRepository;

use crate::error::ExecutionError;

/// Outcome of [`InputCoordinator::offer`].
#[derive(Debug, Clone)]
pub struct OfferOutcome {
    /// Whether the target node now has everything it needs to fire.
    pub ready: bool,
    /// The accumulated inputs, present only when `ready` is `true`.
    pub inputs: Option<std::collections::HashMap<String, NodeResult>>,
}

/// Merges inputs arriving for a node across one or more upstream
/// connections and decides readiness per the node's declared
/// [`InputRequirements`].
pub struct InputCoordinator {
    repo: Arc<dyn InputCoordinationRepository>,
}

impl InputCoordinator {
    #[must_use]
    pub fn new(repo: Arc<dyn InputCoordinationRepository>) -> Self {
        Self { repo }
    }

    /// Offer one upstream result to a pending node execution.
    ///
    /// `requirements` is the target node's declared input requirements,
    /// snapshotted by the caller (the worker, which already holds the
    /// published workflow node) at the moment of the first offer for a
    /// given `(execution_id, target_node_id)` pair — later offers reuse
    /// whatever was snapshotted into the persisted `NodeInputState`.
    pub async fn offer(
        &self,
        execution_id: ExecutionId,
        target_node_id: &str,
        target_port: &str,
        requirements: InputRequirements,
        input: NodeResult,
    ) -> Result<OfferOutcome, ExecutionError> {
        let mut state = match self
            .repo
            .find_pending(target_node_id, execution_id)
            .await
            .map_err(ExecutionError::from)?
        {
            Some(existing) => existing,
            None => nebula_core::NodeInputState::new(target_node_id, execution_id, requirements),
        };

        if let Some(existing) = state.received_inputs.get(target_port) {
            if result_hash(existing) == result_hash(&input) {
                // Duplicate delivery of the same payload on the same
                // port: a no-op, per spec's idempotence requirement.
                let ready = state.is_ready();
                return Ok(self.finish(state, ready).await?);
            }
        }

        let ready_after_merge = state.receive(target_port, input);

        let timed_out = state
            .requirements
            .timeout
            .is_some_and(|timeout| state.is_expired(timeout));

        let ready = ready_after_merge || timed_out;
        self.finish(state, ready).await
    }

    async fn finish(
        &self,
        state: nebula_core::NodeInputState,
        ready: bool,
    ) -> Result<OfferOutcome, ExecutionError> {
        if ready {
            self.repo
                .delete_state(state.node_execution_id)
                .await
                .map_err(ExecutionError::from)?;
            Ok(OfferOutcome {
                ready: true,
                inputs: Some(state.received_inputs),
            })
        } else {
            self.repo.save_state(state).await.map_err(ExecutionError::from)?;
            Ok(OfferOutcome {
                ready: false,
                inputs: None,
            })
        }
    }

    /// Run the periodic retention sweep, logging how many states were
    /// removed.
    pub async fn sweep_expired(&self, max_age: std::time::Duration) -> Result<u64, ExecutionError> {
        let count = self.repo.cleanup_expired(max_age).await.map_err(ExecutionError::from)?;
        tracing::info!(count, "input coordinator swept expired states");
        Ok(count)
    }
}

fn result_hash(result: &NodeResult) -> u64 {
    let mut hasher = DefaultHasher::new();
    result.node_id.hash(&mut hasher);
    matches!(result.status, NodeResultStatus::Success).hash(&mut hasher);
    result.error.hash(&mut hasher);
    // `Value` isn't `Hash`; its canonical serialized form stands in for
    // structural equality, which is what "same payload" means here.
    if let Ok(json) = serde_json::to_string(&result.data) {
        json.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::WaitMode as Wm;
    use nebula_storage::InMemoryStore;

    fn reqs(ports: &[&str], wait_mode: WaitMode) -> InputRequirements {
        InputRequirements::new(ports.iter().map(|p| nebula_core::PortName::new(*p).unwrap()).collect())
            .with_wait_mode(wait_mode)
    }

    fn result(port: &str, v: i64) -> NodeResult {
        let mut data = std::collections::HashMap::new();
        data.insert(port.to_string(), serde_json::json!(v));
        NodeResult::success("upstream", data)
    }

    #[tokio::test]
    async fn all_mode_waits_for_every_required_port() {
        let store = InMemoryStore::new();
        let coordinator = InputCoordinator::new(store);
        let exec = ExecutionId::v4();
        let requirements = reqs(&["a", "b"], Wm::All);

        let first = coordinator
            .offer(exec, "merge1", "a", requirements.clone(), result("a", 1))
            .await
            .unwrap();
        assert!(!first.ready);

        let second = coordinator
            .offer(exec, "merge1", "b", requirements, result("b", 2))
            .await
            .unwrap();
        assert!(second.ready);
        assert_eq!(second.inputs.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn any_mode_fires_on_first_required_port() {
        let store = InMemoryStore::new();
        let coordinator = InputCoordinator::new(store);
        let exec = ExecutionId::v4();
        let requirements = reqs(&["a", "b"], Wm::Any);

        let first = coordinator
            .offer(exec, "merge1", "a", requirements, result("a", 1))
            .await
            .unwrap();
        assert!(first.ready);
    }

    #[tokio::test]
    async fn duplicate_delivery_on_same_port_is_a_no_op() {
        let store = InMemoryStore::new();
        let coordinator = InputCoordinator::new(store);
        let exec = ExecutionId::v4();
        let requirements = reqs(&["a", "b"], Wm::All);

        coordinator
            .offer(exec, "merge1", "a", requirements.clone(), result("a", 1))
            .await
            .unwrap();
        // Same payload redelivered on the same port before "b" arrives.
        let repeat = coordinator
            .offer(exec, "merge1", "a", requirements, result("a", 1))
            .await
            .unwrap();
        assert!(!repeat.ready);
    }

    #[tokio::test]
    async fn sweep_expired_reports_zero_when_nothing_pending() {
        let store = InMemoryStore::new();
        let coordinator = InputCoordinator::new(store);
        let count = coordinator
            .sweep_expired(std::time::Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
