//! The dispatcher loop (spec §4.6): for every [`TriggerEvent`] on
//! `operion.trigger`, look up published trigger nodes matching its
//! `(source_id, event_type, provider_id)`, and emit one
//! [`WorkflowTriggered`] per match on `operion.events`.
//!
//! `execution_id` is derived deterministically from `(event.id,
//! published_workflow_id)` rather than freshly generated, so a
//! redelivered trigger event (the underlying source at-least-once,
//! e.g. a webhook retry) produces the same execution id on every
//! attempt — downstream idempotence (worker's "drop if already
//! running/terminal") relies on this collision.

use std::sync::Arc;

use nebula_core::{ExecutionId, WorkflowId};
use nebula_eventbus::{message_type, Envelope, EventBus, TriggerEvent, WorkflowTriggered, EVENTS_TOPIC, TRIGGER_TOPIC};
use nebula_storage::traits::NodeRepository;
use nebula_workflow::WorkflowStatus;
use tokio_util::sync::CancellationToken;

use crate::error::DispatcherError;

/// Computes the deterministic execution id for one `(trigger event,
/// workflow)` pair. UUIDv5 over a fixed namespace gives a stable,
/// collision-resistant id without needing a central counter.
pub fn deterministic_execution_id(event_id: &str, workflow_id: WorkflowId) -> ExecutionId {
    let name = format!("{event_id}:{workflow_id}");
    let uuid = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, name.as_bytes());
    ExecutionId::parse(&uuid.to_string()).expect("uuidv5 output is always a valid uuid string")
}

/// Matches trigger events against published workflows and fans them out.
pub struct Dispatcher {
    nodes: Arc<dyn NodeRepository>,
    bus: Arc<EventBus>,
}

impl Dispatcher {
    pub fn new(nodes: Arc<dyn NodeRepository>, bus: Arc<EventBus>) -> Self {
        Self { nodes, bus }
    }

    /// Subscribes to `operion.trigger` under the `dispatcher` consumer
    /// group and processes deliveries one partition at a time until
    /// `cancellation` fires.
    pub async fn run(&self, cancellation: CancellationToken) -> Result<(), DispatcherError> {
        let consumers = self.bus.subscribe(TRIGGER_TOPIC, "dispatcher");
        let mut tasks = Vec::with_capacity(consumers.len());

        for consumer in consumers {
            let nodes = self.nodes.clone();
            let bus = self.bus.clone();
            let cancellation = cancellation.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    let delivery = tokio::select! {
                        _ = cancellation.cancelled() => return Ok(()),
                        delivery = consumer.recv() => delivery,
                    };
                    let Some(delivery) = delivery else { return Ok(()) };

                    if let Err(err) = handle_delivery(&nodes, &bus, delivery.envelope).await {
                        tracing::error!(error = %err, "dispatcher failed to process trigger event");
                    }
                }
            }));
        }

        for task in tasks {
            let _ = task.await;
        }
        Ok(())
    }
}

async fn handle_delivery(
    nodes: &Arc<dyn NodeRepository>,
    bus: &Arc<EventBus>,
    envelope: Envelope,
) -> Result<(), DispatcherError> {
    let event: TriggerEvent = serde_json::from_value(envelope.payload)?;

    let matches = nodes
        .find_trigger_nodes(&event.source_id, &event.event_type, &event.provider_id, WorkflowStatus::Published)
        .await?;

    for (workflow_id, node) in matches {
        let execution_id = deterministic_execution_id(&event.id, workflow_id);
        let triggered = WorkflowTriggered {
            execution_id,
            published_workflow_id: workflow_id,
            trigger_node_id: node.id.to_string(),
            trigger_data: event.data.clone(),
            correlation_id: event.id.clone(),
        };

        let out_envelope = Envelope::new(
            message_type::WORKFLOW_TRIGGERED,
            uuid::Uuid::new_v4().to_string(),
            event.id.clone(),
            serde_json::to_value(&triggered)?,
        );

        match bus.publish(EVENTS_TOPIC, &execution_id.to_string(), out_envelope) {
            Ok(()) => {}
            Err(nebula_eventbus::EventBusError::NoSubscribers(_)) => {
                tracing::warn!(%execution_id, "no worker subscribed to operion.events yet, dropping WorkflowTriggered");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_storage::InMemoryStore;
    use nebula_storage::traits::WorkflowRepository;
    use nebula_workflow::domain::{NodeCategory, Position, Workflow, WorkflowNode};

    fn published_workflow_with_trigger() -> (Workflow, WorkflowNode) {
        let node = WorkflowNode {
            id: "trigger-1".to_string(),
            node_type: nebula_core::NodeTypeKey::new("webhook").unwrap(),
            category: NodeCategory::Trigger,
            name: "Trigger".to_string(),
            config: serde_json::json!({}),
            enabled: true,
            position: Position { x: 0.0, y: 0.0 },
            source_id: Some("/hooks/test".to_string()),
            provider_id: Some("webhook".to_string()),
            event_type: Some("post".to_string()),
        };
        let workflow = Workflow {
            id: nebula_core::WorkflowId::v4(),
            workflow_group_id: nebula_core::WorkflowGroupId::v4(),
            status: nebula_workflow::domain::WorkflowStatus::Published,
            name: "wf".to_string(),
            description: String::new(),
            variables: std::collections::HashMap::new(),
            metadata: std::collections::HashMap::new(),
            owner: "test".to_string(),
            nodes: vec![node.clone()],
            connections: vec![],
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            published_at: Some(chrono::Utc::now()),
            deleted_at: None,
        };
        (workflow, node)
    }

    #[test]
    fn deterministic_ids_collide_on_redelivery() {
        let workflow_id = nebula_core::WorkflowId::v4();
        let a = deterministic_execution_id("evt-1", workflow_id);
        let b = deterministic_execution_id("evt-1", workflow_id);
        assert_eq!(a, b);
    }

    #[test]
    fn different_events_get_different_ids() {
        let workflow_id = nebula_core::WorkflowId::v4();
        let a = deterministic_execution_id("evt-1", workflow_id);
        let b = deterministic_execution_id("evt-2", workflow_id);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn emits_workflow_triggered_for_matching_trigger_node() {
        let store = InMemoryStore::new();
        let (workflow, _node) = published_workflow_with_trigger();
        store.save(workflow.clone()).await.unwrap();
        store.publish(workflow.id).await.unwrap();

        let bus = Arc::new(EventBus::new(1));
        let consumers = bus.subscribe(nebula_eventbus::EVENTS_TOPIC, "worker");

        let node_repo: Arc<dyn NodeRepository> = store.clone();
        let event = TriggerEvent {
            id: "evt-1".to_string(),
            source_id: "/hooks/test".to_string(),
            provider_id: "webhook".to_string(),
            event_type: "post".to_string(),
            data: serde_json::json!({"ping": true}),
            emitted_at: chrono::Utc::now(),
        };
        let envelope = Envelope::new(message_type::TRIGGER_EVENT, "evt-1", "evt-1", serde_json::to_value(&event).unwrap());

        handle_delivery(&node_repo, &bus, envelope).await.unwrap();

        let delivery = consumers[0].recv().await.unwrap();
        let triggered: WorkflowTriggered = serde_json::from_value(delivery.envelope.payload).unwrap();
        assert_eq!(triggered.published_workflow_id, workflow.id);
        assert_eq!(triggered.trigger_node_id, "trigger-1");
    }
}
