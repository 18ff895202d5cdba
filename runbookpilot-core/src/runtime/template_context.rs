// runbookpilot-core/src/runtime/template_context.rs
// ============================================================================
// Module: Template Context Assembly
// Description: Builds the alert/steps/context/env layers templating resolves
//              paths against, from one ExecutionContext.
// Purpose: Share one assembly routine across the scheduler, tier executors,
//          and rollback engine instead of duplicating the layout.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! `steps.<id>.output` is assembled from [`ExecutionContext::step_outputs`];
//! `context.*` is the execution's free-form `variables` plus two engine-owned
//! keys (`execution_id`, `mode`); `env.*` is the process environment,
//! snapshotted once per resolution since step dispatch never mutates it.

use serde_json::Value;
use serde_json::json;

use crate::core::ExecutionContext;

/// The three layered values templating needs beyond the alert itself.
pub struct BuiltContext {
    /// `steps.<id>.output` tree.
    pub steps: Value,
    /// `context.*` tree: execution variables plus `execution_id`/`mode`.
    pub context: Value,
    /// `env.*` tree: a snapshot of the process environment.
    pub env: Value,
}

/// Assembles the steps/context/env layers from `ctx`.
#[must_use]
pub fn build(ctx: &ExecutionContext) -> BuiltContext {
    let steps = Value::Object(
        ctx.step_outputs
            .iter()
            .map(|(id, output)| (id.clone(), json!({"output": output})))
            .collect(),
    );

    let mut context = serde_json::Map::new();
    for (key, value) in &ctx.variables {
        context.insert(key.clone(), value.clone());
    }
    context.insert("execution_id".to_string(), json!(ctx.execution_id.as_str()));
    context.insert("mode".to_string(), json!(format!("{:?}", ctx.mode).to_lowercase()));

    let env = Value::Object(std::env::vars().map(|(key, value)| (key, Value::String(value))).collect());

    BuiltContext { steps, context: Value::Object(context), env }
}

#[cfg(test)]
mod tests {
    use crate::core::ExecutionId;
    use crate::core::ExecutionMode;
    use crate::core::RunbookId;

    use super::*;

    #[test]
    fn steps_tree_wraps_each_output_under_its_id() {
        let mut ctx = ExecutionContext::new(
            ExecutionId::generate(),
            RunbookId::new("rb"),
            "1".to_string(),
            ExecutionMode::Production,
            None,
        );
        ctx.step_outputs.insert("s1".to_string(), json!({"risk_score": 85}));
        let built = build(&ctx);
        assert_eq!(built.steps.get("s1").and_then(|v| v.get("output")).and_then(|v| v.get("risk_score")), Some(&json!(85)));
    }

    #[test]
    fn context_tree_carries_execution_id_and_mode() {
        let ctx = ExecutionContext::new(
            ExecutionId::generate(),
            RunbookId::new("rb"),
            "1".to_string(),
            ExecutionMode::Simulation,
            None,
        );
        let built = build(&ctx);
        assert_eq!(built.context.get("mode").and_then(Value::as_str), Some("simulation"));
    }
}
