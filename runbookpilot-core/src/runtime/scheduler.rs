// runbookpilot-core/src/runtime/scheduler.rs
// ============================================================================
// Module: Step Scheduler
// Description: Topological walk order plus single-step dispatch: condition
//              guard, parameter templating, adapter lookup, and timeout.
// Purpose: Give every tier executor one shared "run this one step" routine
//          so L0/L1/L2 differ only in how they gate write steps.
// Dependencies: crate::core, crate::interfaces, crate::runtime::templating,
//               tokio
// ============================================================================

//! ## Overview
//! [`topological_order`] returns a fixed walk order for a validated runbook
//! (ties broken by declaration order); [`execute_step`] dispatches exactly
//! one step, racing its declared timeout, and never panics — every failure
//! mode becomes a [`StepResult`] with `success: false`.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use serde_json::Value;
use serde_json::json;

use crate::core::ExecutionContext;
use crate::core::OpaqueMap;
use crate::core::OpaqueValue;
use crate::core::Runbook;
use crate::core::RunbookStep;
use crate::core::StepId;
use crate::core::StepResult;
use crate::core::Timestamp;
use crate::interfaces::Adapter;
use crate::runtime::template_context;
use crate::runtime::templating::Resolved;
use crate::runtime::templating::TemplateContext;
use crate::runtime::templating::evaluate_condition;
use crate::runtime::templating::resolve;

// ============================================================================
// SECTION: Adapter Registry
// ============================================================================

/// A concurrent-read/exclusive-write registry of adapters, keyed by executor
/// name. Registering a name that already exists replaces the adapter.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<BTreeMap<String, Arc<dyn Adapter>>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces, by name) an adapter.
    pub fn register(&self, executor_name: impl Into<String>, adapter: Arc<dyn Adapter>) {
        #[allow(clippy::unwrap_used, reason = "poisoned registry lock is unrecoverable process state")]
        let mut guard = self.adapters.write().unwrap();
        guard.insert(executor_name.into(), adapter);
    }

    /// Looks up an adapter by executor name.
    #[must_use]
    pub fn get(&self, executor_name: &str) -> Option<Arc<dyn Adapter>> {
        #[allow(clippy::unwrap_used, reason = "poisoned registry lock is unrecoverable process state")]
        let guard = self.adapters.read().unwrap();
        guard.get(executor_name).cloned()
    }
}

// ============================================================================
// SECTION: Topological Order
// ============================================================================

/// Returns a dependency-respecting walk order over `runbook.steps`: a
/// post-order depth-first traversal, visiting declared order among siblings.
/// Assumes [`Runbook::validate`] has already confirmed the graph is acyclic.
#[must_use]
pub fn topological_order(runbook: &Runbook) -> Vec<StepId> {
    let by_id: BTreeMap<&str, &RunbookStep> =
        runbook.steps.iter().map(|step| (step.id.as_str(), step)).collect();
    let mut visited = BTreeSet::new();
    let mut order = Vec::with_capacity(runbook.steps.len());

    fn visit<'a>(
        step: &'a RunbookStep,
        by_id: &BTreeMap<&'a str, &'a RunbookStep>,
        visited: &mut BTreeSet<&'a str>,
        order: &mut Vec<StepId>,
    ) {
        if !visited.insert(step.id.as_str()) {
            return;
        }
        for dep in &step.depends_on {
            if let Some(dep_step) = by_id.get(dep.as_str()) {
                visit(dep_step, by_id, visited, order);
            }
        }
        order.push(step.id.clone());
    }

    for step in &runbook.steps {
        visit(step, &by_id, &mut visited, &mut order);
    }
    order
}

/// Builds `"Dependencies not met"` skip results for every step the walk
/// never reached because an earlier step halted it. Keeps the "every step
/// produces exactly one StepResult" invariant intact across a halt.
#[must_use]
pub fn skip_unreached(remaining: &[&RunbookStep]) -> Vec<StepResult> {
    remaining
        .iter()
        .map(|step| {
            StepResult::skipped(step.id.clone(), step.name.clone(), step.action.clone(), "Dependencies not met")
        })
        .collect()
}

// ============================================================================
// SECTION: Step Dispatch
// ============================================================================

/// Result of dispatching (or skipping) one step.
pub struct StepOutcome {
    /// The recorded result.
    pub result: StepResult,
    /// Whether the scheduler should keep walking after this step.
    pub should_continue: bool,
    /// Whether this step has a `rollback` clause the rollback engine could run.
    pub has_rollback: bool,
}

/// Dispatches one step: resolves its condition guard and parameters against
/// `ctx`, looks up its adapter in `adapters`, and races its declared timeout.
pub async fn execute_step(
    step: &RunbookStep,
    ctx: &ExecutionContext,
    adapters: &AdapterRegistry,
) -> StepOutcome {
    let built = template_context::build(ctx);
    let alert_value = ctx.alert.as_ref().map(|alert| json!(alert.document));

    if let Some(condition) = &step.condition {
        let template_ctx = TemplateContext {
            alert: alert_value.as_ref(),
            steps: &built.steps,
            context: &built.context,
            env: &built.env,
        };
        let Resolved { value, .. } = resolve(&Value::String(condition.clone()), &template_ctx);
        let resolved_text = match &value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        if !evaluate_condition(&resolved_text) {
            let result =
                StepResult::skipped(step.id.clone(), step.name.clone(), step.action.clone(), "Condition not met");
            return StepOutcome { result, should_continue: true, has_rollback: step.rollback.is_some() };
        }
    }

    let Some(adapter) = adapters.get(step.executor.as_str()) else {
        let result = failed_result(
            step,
            "ADAPTER_NOT_FOUND",
            &format!("no adapter registered for executor '{}'", step.executor.as_str()),
        );
        return StepOutcome {
            result,
            should_continue: step.on_error.permits_continuation(),
            has_rollback: step.rollback.is_some(),
        };
    };

    let resolved_params = resolve_parameters(&step.parameters, alert_value.as_ref(), &built);

    let started_at = Timestamp::now();
    let dispatch = tokio::time::timeout(
        Duration::from_secs(step.timeout),
        adapter.execute(step.action.as_str(), &resolved_params, ctx.mode),
    )
    .await;
    let completed_at = Timestamp::now();
    let duration_ms = started_at.millis_until(completed_at);

    let result = match dispatch {
        Ok(outcome) if outcome.success => StepResult {
            step_id: step.id.clone(),
            step_name: step.name.clone(),
            action: step.action.clone(),
            success: true,
            started_at,
            completed_at,
            duration_ms,
            output: outcome.output,
            error: None,
        },
        Ok(outcome) => StepResult {
            step_id: step.id.clone(),
            step_name: step.name.clone(),
            action: step.action.clone(),
            success: false,
            started_at,
            completed_at,
            duration_ms,
            output: None,
            error: Some(json!({
                "code": "STEP_EXECUTION_FAILED",
                "message": outcome.error.as_ref().map_or("adapter reported failure", |e| e.message.as_str()),
                "adapter_error": outcome.error,
            })),
        },
        Err(_) => failed_result(step, "STEP_TIMEOUT", &format!("step exceeded its {}s timeout", step.timeout)),
    };

    StepOutcome {
        should_continue: result.success || step.on_error.permits_continuation(),
        has_rollback: step.rollback.is_some(),
        result,
    }
}

/// Resolves a step's (or rollback clause's) declared parameters against the
/// current templating context.
#[must_use]
pub fn resolve_parameters(
    parameters: &OpaqueMap,
    alert_value: Option<&Value>,
    built: &template_context::BuiltContext,
) -> OpaqueValue {
    let template_ctx =
        TemplateContext { alert: alert_value, steps: &built.steps, context: &built.context, env: &built.env };
    let raw = Value::Object(parameters.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
    resolve(&raw, &template_ctx).value
}

// ============================================================================
// SECTION: Namespace Wrapper
// ============================================================================

/// Thin namespace bundling [`topological_order`] and [`execute_step`] for
/// callers that prefer a type-qualified path.
pub struct StepScheduler;

impl StepScheduler {
    /// See [`topological_order`].
    #[must_use]
    pub fn topological_order(runbook: &Runbook) -> Vec<StepId> {
        topological_order(runbook)
    }

    /// See [`execute_step`].
    pub async fn execute_step(step: &RunbookStep, ctx: &ExecutionContext, adapters: &AdapterRegistry) -> StepOutcome {
        execute_step(step, ctx, adapters).await
    }
}

fn failed_result(step: &RunbookStep, code: &str, message: &str) -> StepResult {
    let now = Timestamp::now();
    StepResult {
        step_id: step.id.clone(),
        step_name: step.name.clone(),
        action: step.action.clone(),
        success: false,
        started_at: now,
        completed_at: now,
        duration_ms: 0,
        output: None,
        error: Some(json!({"code": code, "message": message})),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::core::ActionName;
    use crate::core::AutomationLevel;
    use crate::core::ExecutionId;
    use crate::core::ExecutionMode;
    use crate::core::ExecutorName;
    use crate::core::OnError;
    use crate::core::RunbookConfig;
    use crate::core::RunbookId;
    use crate::interfaces::AdapterResult;

    use super::*;

    struct EchoAdapter;

    #[async_trait]
    impl Adapter for EchoAdapter {
        async fn execute(&self, action: &str, params: &OpaqueValue, _mode: ExecutionMode) -> AdapterResult {
            AdapterResult {
                success: true,
                action: action.to_string(),
                executor: "echo".to_string(),
                duration_ms: 1,
                output: Some(params.clone()),
                error: None,
            }
        }
    }

    fn sample_step(id: &str, depends_on: &[&str]) -> RunbookStep {
        RunbookStep {
            id: StepId::new(id),
            name: id.to_string(),
            action: ActionName::new("query_siem"),
            executor: ExecutorName::new("echo"),
            parameters: OpaqueMap::new(),
            depends_on: depends_on.iter().map(|d| StepId::new(*d)).collect(),
            condition: None,
            on_error: OnError::Halt,
            timeout: 5,
            approval_required: None,
            rollback: None,
        }
    }

    fn sample_runbook(steps: Vec<RunbookStep>) -> Runbook {
        Runbook {
            id: RunbookId::new("rb"),
            version: "1".to_string(),
            name: "rb".to_string(),
            metadata: OpaqueMap::new(),
            triggers: Vec::new(),
            config: RunbookConfig {
                automation_level: AutomationLevel::L1,
                max_execution_time: 60,
                requires_approval: false,
                rollback_on_failure: true,
            },
            steps,
        }
    }

    #[test]
    fn topological_order_visits_dependencies_before_dependents() {
        let runbook =
            sample_runbook(vec![sample_step("b", &["a"]), sample_step("a", &[]), sample_step("c", &["b"])]);
        let order: Vec<String> = topological_order(&runbook).into_iter().map(|id| id.to_string()).collect();
        assert_eq!(order, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn condition_false_skips_without_dispatching() {
        let mut step = sample_step("s1", &[]);
        step.condition = Some("false".to_string());
        let ctx = ExecutionContext::new(
            ExecutionId::generate(),
            RunbookId::new("rb"),
            "1".to_string(),
            ExecutionMode::Production,
            None,
        );
        let adapters = AdapterRegistry::new();
        let outcome = execute_step(&step, &ctx, &adapters).await;
        assert!(outcome.result.success);
        assert_eq!(outcome.result.output.and_then(|o| o.get("skipped").cloned()), Some(json!(true)));
    }

    #[tokio::test]
    async fn missing_adapter_reports_adapter_not_found() {
        let step = sample_step("s1", &[]);
        let ctx = ExecutionContext::new(
            ExecutionId::generate(),
            RunbookId::new("rb"),
            "1".to_string(),
            ExecutionMode::Production,
            None,
        );
        let adapters = AdapterRegistry::new();
        let outcome = execute_step(&step, &ctx, &adapters).await;
        assert!(!outcome.result.success);
        assert_eq!(
            outcome.result.error.and_then(|e| e.get("code").and_then(Value::as_str).map(String::from)),
            Some("ADAPTER_NOT_FOUND".to_string())
        );
    }

    #[tokio::test]
    async fn registered_adapter_dispatches_and_echoes_resolved_parameters() {
        let mut step = sample_step("s1", &[]);
        step.parameters.insert("host".to_string(), json!("web-01"));
        let ctx = ExecutionContext::new(
            ExecutionId::generate(),
            RunbookId::new("rb"),
            "1".to_string(),
            ExecutionMode::Production,
            None,
        );
        let adapters = AdapterRegistry::new();
        adapters.register("echo", Arc::new(EchoAdapter));
        let outcome = execute_step(&step, &ctx, &adapters).await;
        assert!(outcome.result.success);
        assert_eq!(outcome.result.output.and_then(|o| o.get("host").cloned()), Some(json!("web-01")));
    }
}
