//! The six built-in node types: http, transform, log, file_write,
//! conditional, merge.
//!
//! Each module owns one node type's config, [`crate::node::Node`] impl, and
//! [`crate::node::NodeFactory`]. [`register_builtin_nodes`] wires all six
//! into a fresh [`crate::registry::NodeRegistry`] under their canonical
//! type keys.

pub mod conditional;
pub mod file_write;
pub mod http;
pub mod log;
pub mod merge;
pub mod transform;

use std::collections::HashMap;
use std::sync::Arc;

use nebula_core::NodeResult;
use nebula_expression::{EvaluationContext, ExpressionEngine, ExpressionResult};
use serde_json::Value;

use crate::context::ActionContext;
use crate::port::PortKey;
use crate::registry::{NodeRegistry, RegistryError};

/// Builds the [`EvaluationContext`] a node's templated/expression config
/// fields are rendered against: `$execution.id`, `$execution.variables`,
/// one `$node.<port>` entry per resolved input, `$input` set to the single
/// input's data (or, when a node fans in more than one port, an object
/// keyed by port name), `$trigger_data` set to the data that triggered the
/// execution, and `$node_results.<node_id>.<port>` covering every node
/// completed so far in the execution (not just this node's immediate
/// fan-in).
pub(crate) fn build_context(ctx: &ActionContext, inputs: &HashMap<PortKey, NodeResult>) -> EvaluationContext {
    let mut ectx = EvaluationContext::new();
    ectx.set_execution_var("id", Value::String(ctx.execution_id.to_string()));
    ectx.set_execution_var("workflow_id", Value::String(ctx.workflow_id.to_string()));
    ectx.set_execution_var("variables", Value::Object(ctx.variables().clone()));

    for (port, result) in inputs {
        let data = serde_json::to_value(&result.data).unwrap_or(Value::Null);
        ectx.set_node_data(port.clone(), data);
    }

    let input_value = if let Some(result) = inputs.values().next().filter(|_| inputs.len() == 1) {
        serde_json::to_value(&result.data).unwrap_or(Value::Null)
    } else {
        let mut obj = serde_json::Map::with_capacity(inputs.len());
        for (port, result) in inputs {
            obj.insert(port.clone(), serde_json::to_value(&result.data).unwrap_or(Value::Null));
        }
        Value::Object(obj)
    };
    ectx.set_input(input_value);

    ectx.set_trigger_data(ctx.trigger_data().clone());
    for (node_id, result) in ctx.node_results() {
        let data = serde_json::to_value(&result.data).unwrap_or(Value::Null);
        ectx.set_node_result(node_id.clone(), data);
    }

    ectx
}

/// Renders every string leaf of `value` as a template, recursing through
/// arrays and objects; numbers, booleans, and null pass through unchanged.
///
/// Used to resolve a node's `headers`/`body`/`url`-shaped config before
/// dispatch, since any of those fields may be a literal or a `{{ }}`
/// template in the workflow author's config.
pub(crate) fn render_value_templates(
    value: &Value,
    engine: &ExpressionEngine,
    ctx: &EvaluationContext,
) -> ExpressionResult<Value> {
    match value {
        Value::String(s) => {
            let template = engine.parse_template(s.clone())?;
            let rendered = engine.render_template(&template, ctx)?;
            Ok(Value::String(rendered))
        }
        Value::Array(items) => {
            let rendered: Result<Vec<_>, _> =
                items.iter().map(|item| render_value_templates(item, engine, ctx)).collect();
            Ok(Value::Array(rendered?))
        }
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                rendered.insert(key.clone(), render_value_templates(val, engine, ctx)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}

/// Renders a single templated string field.
pub(crate) fn render_template_str(
    source: &str,
    engine: &ExpressionEngine,
    ctx: &EvaluationContext,
) -> ExpressionResult<String> {
    let template = engine.parse_template(source)?;
    engine.render_template(&template, ctx)
}

/// Registers all six built-in node types under their canonical type keys
/// (`http.request`, `transform`, `log`, `file.write`, `conditional`,
/// `merge`).
pub fn register_builtin_nodes(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    http::register(registry)?;
    transform::register(registry)?;
    log::register(registry)?;
    file_write::register(registry)?;
    conditional::register(registry)?;
    merge::register(registry)?;
    Ok(())
}
