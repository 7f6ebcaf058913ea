//! The graph executor (spec §4.7): drives one published workflow's
//! nodes to completion in response to `WorkflowTriggered`/`NodeCompleted`
//! events on `operion.events`.
//!
//! Bus partitioning by `execution_id` already serializes every event of
//! one execution onto a single consumer task, so the handlers below
//! mutate `ExecutionContext` without additional per-execution locking.
//! A `pending` counter per execution tracks nodes that have been
//! scheduled but whose completion hasn't been processed yet, used to
//! detect "nothing left to do" when a node has no outgoing connections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use nebula_action::{ActionContext, Node, NodeRegistry};
use nebula_core::{ExecutionId, NodeId, NodeResult};
use nebula_eventbus::{
    message_type, Envelope, EventBus, NodeCompleted, NodeFailed, WorkflowCompleted, WorkflowFailed, WorkflowTriggered,
    EVENTS_TOPIC,
};
use nebula_execution::InputCoordinator;
use nebula_storage::traits::{ConnectionRepository, ExecutionContextRepository, WorkflowRepository};
use nebula_workflow::domain::Workflow;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// Drives published workflows to completion, one consumer-group
/// partition at a time, bounded by an overall in-flight node-execution
/// limit.
pub struct Worker {
    registry: Arc<NodeRegistry>,
    workflows: Arc<dyn WorkflowRepository>,
    connections: Arc<dyn ConnectionRepository>,
    executions: Arc<dyn ExecutionContextRepository>,
    coordinator: Arc<InputCoordinator>,
    bus: Arc<EventBus>,
    pending: Arc<DashMap<ExecutionId, AtomicI64>>,
    concurrency: Arc<Semaphore>,
}

impl Worker {
    pub fn new(
        registry: Arc<NodeRegistry>,
        workflows: Arc<dyn WorkflowRepository>,
        connections: Arc<dyn ConnectionRepository>,
        executions: Arc<dyn ExecutionContextRepository>,
        coordinator: Arc<InputCoordinator>,
        bus: Arc<EventBus>,
        max_concurrent_nodes: usize,
    ) -> Self {
        Self {
            registry,
            workflows,
            connections,
            executions,
            coordinator,
            bus,
            pending: Arc::new(DashMap::new()),
            concurrency: Arc::new(Semaphore::new(max_concurrent_nodes.max(1))),
        }
    }

    /// Subscribes to `operion.events` under the `worker` consumer group
    /// and processes deliveries, one task per partition, until
    /// `cancellation` fires.
    pub async fn run(self: &Arc<Self>, cancellation: CancellationToken) -> Result<(), WorkerError> {
        let consumers = self.bus.subscribe(EVENTS_TOPIC, "worker");
        let mut tasks = Vec::with_capacity(consumers.len());

        for consumer in consumers {
            let worker = self.clone();
            let cancellation = cancellation.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    let delivery = tokio::select! {
                        _ = cancellation.cancelled() => return,
                        delivery = consumer.recv() => delivery,
                    };
                    let Some(delivery) = delivery else { return };

                    if let Err(err) = worker.handle_envelope(delivery.envelope).await {
                        tracing::error!(error = %err, "worker failed to process event");
                    }
                }
            }));
        }

        for task in tasks {
            let _ = task.await;
        }
        Ok(())
    }

    async fn handle_envelope(self: &Arc<Self>, envelope: Envelope) -> Result<(), WorkerError> {
        match envelope.message_type.as_str() {
            message_type::WORKFLOW_TRIGGERED => self.handle_workflow_triggered(envelope.payload).await,
            message_type::NODE_COMPLETED => self.handle_node_completed(envelope.payload).await,
            other => {
                tracing::debug!(message_type = other, "worker ignoring event type it doesn't consume");
                Ok(())
            }
        }
    }

    async fn handle_workflow_triggered(self: &Arc<Self>, payload: serde_json::Value) -> Result<(), WorkerError> {
        let event: WorkflowTriggered = serde_json::from_value(payload)?;

        if self.executions.get(event.execution_id).await.is_ok() {
            // Redelivery of a `WorkflowTriggered` we've already started
            // on (running or terminal) — idempotent no-op.
            return Ok(());
        }

        let workflow = self.workflows.get_by_id(event.published_workflow_id).await?;

        let mut context = nebula_core::ExecutionContext::new(
            event.execution_id,
            event.published_workflow_id,
            event.trigger_data.clone(),
            workflow.variables.clone(),
        );

        if workflow.node(&event.trigger_node_id).is_none() {
            context.fail(format!("trigger node {} not found in published workflow", event.trigger_node_id));
            self.executions.save(context).await?;
            self.emit_workflow_failed(event.execution_id, "trigger node not found").await?;
            return Ok(());
        }

        self.executions.save(context).await?;

        let mut data = HashMap::with_capacity(1);
        data.insert("main".to_string(), event.trigger_data.clone());
        let trigger_result = NodeResult::success(event.trigger_node_id.clone(), data);

        let mut results = HashMap::with_capacity(1);
        results.insert("main".to_string(), trigger_result);

        self.emit_node_completed(event.execution_id, event.trigger_node_id, results)?;
        Ok(())
    }

    async fn handle_node_completed(self: &Arc<Self>, payload: serde_json::Value) -> Result<(), WorkerError> {
        let event: NodeCompleted = serde_json::from_value(payload)?;
        self.complete_node(event.execution_id, event.node_id, event.results).await
    }

    /// Merges a node's per-port results into the execution context,
    /// routes each output port's connections through the input
    /// coordinator, schedules newly-ready downstream nodes, and
    /// completes the execution once nothing is left pending.
    async fn complete_node(
        self: &Arc<Self>,
        execution_id: ExecutionId,
        node_id: String,
        results: HashMap<String, NodeResult>,
    ) -> Result<(), WorkerError> {
        let mut context = self.executions.get(execution_id).await?;
        if !context.is_running() {
            return Ok(());
        }

        let mut merged = HashMap::with_capacity(results.len());
        for result in results.values() {
            for (port, value) in &result.data {
                merged.insert(port.clone(), value.clone());
            }
        }
        context.record_result(node_id.clone(), NodeResult::success(node_id.clone(), merged));
        self.executions.save(context.clone()).await?;

        self.decrement_pending(execution_id);

        let workflow = self.workflows.get_by_id(context.published_workflow_id).await?;
        let outgoing = self.connections.get_outgoing(workflow.id, &node_id).await?;

        for connection in &outgoing {
            let Some((_, source_port)) = nebula_workflow::domain::Connection::split_port(&connection.source_port)
            else {
                continue;
            };
            let Some(result) = results.get(source_port) else { continue };
            let Some((target_node_id, target_port)) =
                nebula_workflow::domain::Connection::split_port(&connection.target_port)
            else {
                continue;
            };

            let Some(target_node) = workflow.node(target_node_id) else { continue };
            let requirements = match self.build_node(target_node) {
                Ok(node) => node.input_requirements(),
                Err(_) => continue,
            };

            let outcome = self
                .coordinator
                .offer(execution_id, target_node_id, target_port, requirements, result.clone())
                .await?;

            if outcome.ready {
                self.schedule_node(execution_id, target_node.clone(), outcome.inputs.unwrap_or_default());
            }
        }

        if outgoing.is_empty() && self.pending_count(execution_id) == 0 {
            let mut context = self.executions.get(execution_id).await?;
            if context.is_running() {
                context.complete();
                self.executions.save(context).await?;
                self.bus
                    .publish(
                        EVENTS_TOPIC,
                        &execution_id.to_string(),
                        Envelope::new(
                            message_type::WORKFLOW_COMPLETED,
                            uuid::Uuid::new_v4().to_string(),
                            execution_id.to_string(),
                            serde_json::to_value(WorkflowCompleted { execution_id })?,
                        ),
                    )
                    .ok();
            }
        }

        Ok(())
    }

    fn build_node(&self, workflow_node: &nebula_workflow::domain::WorkflowNode) -> Result<Box<dyn Node>, WorkerError> {
        let id = NodeId::new(&workflow_node.id).map_err(|e| WorkerError::InvalidId(e.to_string()))?;
        Ok(self.registry.create(&workflow_node.node_type, id, workflow_node.config.clone())?)
    }

    fn schedule_node(
        self: &Arc<Self>,
        execution_id: ExecutionId,
        workflow_node: nebula_workflow::domain::WorkflowNode,
        inputs: HashMap<String, NodeResult>,
    ) {
        self.increment_pending(execution_id);
        let worker = self.clone();

        tokio::spawn(async move {
            let permit = worker.concurrency.clone().acquire_owned().await;
            let Ok(_permit) = permit else { return };

            let node = match worker.build_node(&workflow_node) {
                Ok(node) => node,
                Err(err) => {
                    tracing::error!(node_id = %workflow_node.id, error = %err, "failed to build node instance");
                    worker.fail_execution(execution_id, err.to_string()).await;
                    return;
                }
            };

            let context = match worker.executions.get(execution_id).await {
                Ok(ctx) => ctx,
                Err(err) => {
                    tracing::error!(error = %err, "execution context disappeared mid-run");
                    return;
                }
            };

            let variables = serde_json::Map::from_iter(context.variables.clone());
            let action_ctx = ActionContext::new(execution_id, node.id().clone(), context.published_workflow_id)
                .with_variables(variables)
                .with_trigger_data(context.trigger_data.clone())
                .with_node_results(context.node_results.clone());

            match node.execute(&action_ctx, inputs).await {
                Ok(output) => {
                    let mut results = HashMap::new();
                    for (port, value) in output.into_ports() {
                        let mut data = HashMap::with_capacity(1);
                        data.insert(port.clone(), value);
                        results.insert(port, NodeResult::success(workflow_node.id.clone(), data));
                    }
                    if let Err(err) = worker.complete_node(execution_id, workflow_node.id.clone(), results).await {
                        tracing::error!(error = %err, "failed to process node completion");
                    }
                }
                Err(action_err) => {
                    worker.handle_node_failure(execution_id, &workflow_node, action_err).await;
                }
            }
        });
    }

    async fn handle_node_failure(
        self: &Arc<Self>,
        execution_id: ExecutionId,
        workflow_node: &nebula_workflow::domain::WorkflowNode,
        error: nebula_action::ActionError,
    ) {
        let error_message = error.to_string();
        self.bus
            .publish(
                EVENTS_TOPIC,
                &execution_id.to_string(),
                Envelope::new(
                    message_type::NODE_FAILED,
                    uuid::Uuid::new_v4().to_string(),
                    execution_id.to_string(),
                    serde_json::to_value(NodeFailed {
                        execution_id,
                        node_id: workflow_node.id.clone(),
                        error: error_message.clone(),
                    })
                    .unwrap_or(serde_json::Value::Null),
                ),
            )
            .ok();

        // Route via the node's `error` output port if a connection from
        // it exists; otherwise the whole execution fails.
        let routed = match self.executions.get(execution_id).await {
            Ok(context) => match self.workflows.get_by_id(context.published_workflow_id).await {
                Ok(workflow) => match self.connections.get_outgoing(workflow.id, &workflow_node.id).await {
                    Ok(outgoing) => outgoing.iter().any(|c| {
                        nebula_workflow::domain::Connection::split_port(&c.source_port)
                            .map(|(_, port)| port == nebula_action::ERROR_PORT)
                            .unwrap_or(false)
                    }),
                    Err(_) => false,
                },
                Err(_) => false,
            },
            Err(_) => false,
        };

        if routed {
            let mut data = HashMap::with_capacity(1);
            data.insert(nebula_action::ERROR_PORT.to_string(), serde_json::json!({ "error": error_message }));
            let result = NodeResult::error(workflow_node.id.clone(), error_message);
            let mut results = HashMap::with_capacity(1);
            results.insert(nebula_action::ERROR_PORT.to_string(), NodeResult { data, ..result });
            if let Err(err) = self.complete_node(execution_id, workflow_node.id.clone(), results).await {
                tracing::error!(error = %err, "failed to route error output");
            }
        } else {
            self.decrement_pending(execution_id);
            self.fail_execution(execution_id, error_message).await;
        }
    }

    async fn fail_execution(&self, execution_id: ExecutionId, reason: String) {
        if let Ok(mut context) = self.executions.get(execution_id).await {
            if context.is_running() {
                context.fail(reason.clone());
                let _ = self.executions.save(context).await;
            }
        }
        let _ = self.emit_workflow_failed(execution_id, reason).await;
    }

    async fn emit_workflow_failed(&self, execution_id: ExecutionId, reason: impl Into<String>) -> Result<(), WorkerError> {
        let envelope = Envelope::new(
            message_type::WORKFLOW_FAILED,
            uuid::Uuid::new_v4().to_string(),
            execution_id.to_string(),
            serde_json::to_value(WorkflowFailed { execution_id, reason: Some(reason.into()) })?,
        );
        self.bus.publish(EVENTS_TOPIC, &execution_id.to_string(), envelope).ok();
        Ok(())
    }

    fn emit_node_completed(
        &self,
        execution_id: ExecutionId,
        node_id: String,
        results: HashMap<String, NodeResult>,
    ) -> Result<(), WorkerError> {
        let envelope = Envelope::new(
            message_type::NODE_COMPLETED,
            uuid::Uuid::new_v4().to_string(),
            execution_id.to_string(),
            serde_json::to_value(NodeCompleted { execution_id, node_id, results })?,
        );
        match self.bus.publish(EVENTS_TOPIC, &execution_id.to_string(), envelope) {
            Ok(()) | Err(nebula_eventbus::EventBusError::NoSubscribers(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn increment_pending(&self, execution_id: ExecutionId) {
        self.pending.entry(execution_id).or_insert_with(|| AtomicI64::new(0)).fetch_add(1, Ordering::SeqCst);
    }

    fn decrement_pending(&self, execution_id: ExecutionId) {
        if let Some(counter) = self.pending.get(&execution_id) {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn pending_count(&self, execution_id: ExecutionId) -> i64 {
        self.pending.get(&execution_id).map(|c| c.load(Ordering::SeqCst)).unwrap_or(0)
    }
}

/// Convenience re-export so callers don't need `nebula_workflow::Workflow`
/// directly for the common "is this workflow published" check.
pub fn is_published(workflow: &Workflow) -> bool {
    matches!(workflow.status, nebula_workflow::domain::WorkflowStatus::Published)
}
