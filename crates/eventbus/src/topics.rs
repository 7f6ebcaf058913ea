//! The two canonical topic names the engine communicates over.

/// Receivers emit `TriggerEvent`s here; the dispatcher is the sole
/// consumer group.
pub const TRIGGER_TOPIC: &str = "operion.trigger";

/// Per-execution events (`WorkflowTriggered`, `NodeCompleted`,
/// `NodeFailed`, `WorkflowCompleted`, `WorkflowFailed`). Workers
/// subscribe as one consumer group; publications are partitioned by
/// `execution_id`.
pub const EVENTS_TOPIC: &str = "operion.events";
