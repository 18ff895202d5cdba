// runbookpilot-core/src/runtime/tiers/l0.rs
// ============================================================================
// Module: L0 Tier Executor
// Description: Display-only automation: every step requires analyst
//              confirmation before dispatch.
// Purpose: The most conservative tier; nothing runs without an explicit yes.
// Dependencies: crate::core, crate::runtime::{scheduler, template_context}
// ============================================================================

//! ## Overview
//! A declined confirmation is recorded as a skip, not a failure — the
//! analyst chose not to run the step, which is a normal L0 outcome, not an
//! error condition. A decline on a step whose `on_error` is `halt` still
//! aborts the remaining walk; every step the walk never reaches after an
//! abort gets its own "Dependencies not met" skip result.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;

use crate::core::AuditEventType;
use crate::core::ExecutionContext;
use crate::core::Runbook;
use crate::core::StepResult;
use crate::runtime::audit_log::AuditLog;
use crate::runtime::controller::ExecutionController;
use crate::runtime::scheduler::AdapterRegistry;
use crate::runtime::scheduler::execute_step;
use crate::runtime::scheduler::resolve_parameters;
use crate::runtime::scheduler::skip_unreached;
use crate::runtime::scheduler::topological_order;
use crate::runtime::template_context;

use super::ConfirmationCallback;
use super::TierExecutor;
use super::TierRunOutcome;

async fn audit_step_result(audit: &AuditLog, ctx: &ExecutionContext, runbook: &Runbook, result: &StepResult) {
    let event_type = if result.success { AuditEventType::StepCompleted } else { AuditEventType::StepFailed };
    let _ = audit
        .append(
            &ctx.execution_id,
            &runbook.id,
            event_type,
            "engine",
            json!({"step_id": result.step_id.as_str(), "action": result.action.as_str()}),
        )
        .await;
}

/// Confirms every step with the analyst before dispatching it.
pub struct L0Executor {
    confirm: Arc<dyn ConfirmationCallback>,
}

impl L0Executor {
    /// Creates an executor that consults `confirm` before every step.
    #[must_use]
    pub fn new(confirm: Arc<dyn ConfirmationCallback>) -> Self {
        Self { confirm }
    }
}

#[async_trait]
impl TierExecutor for L0Executor {
    async fn run(
        &self,
        runbook: &Runbook,
        ctx: &mut ExecutionContext,
        adapters: &AdapterRegistry,
        controller: &ExecutionController,
        audit: &AuditLog,
    ) -> TierRunOutcome {
        let mut steps = Vec::new();
        let order = topological_order(runbook);
        let by_id: std::collections::BTreeMap<&str, &crate::core::RunbookStep> =
            runbook.steps.iter().map(|step| (step.id.as_str(), step)).collect();

        for (idx, step_id) in order.iter().enumerate() {
            let Some(step) = by_id.get(step_id.as_str()).copied() else { continue };

            if controller.should_abort(&ctx.execution_id) {
                let remaining: Vec<&crate::core::RunbookStep> = order[idx ..]
                    .iter()
                    .filter_map(|id| by_id.get(id.as_str()).copied())
                    .collect();
                for result in skip_unreached(&remaining) {
                    ctx.record_step(&result);
                    steps.push(result);
                }
                return TierRunOutcome { steps, halted: true, error: None, simulation: None };
            }

            let built = template_context::build(ctx);
            let alert_value = ctx.alert.as_ref().map(|alert| json!(alert.document));
            let resolved_params = resolve_parameters(&step.parameters, alert_value.as_ref(), &built);

            let _ = audit
                .append(
                    &ctx.execution_id,
                    &runbook.id,
                    AuditEventType::StepStarted,
                    "engine",
                    json!({"step_id": step.id.as_str(), "action": step.action.as_str()}),
                )
                .await;

            let confirmed = self.confirm.confirm(step.action.as_str(), &resolved_params).await;
            if !confirmed {
                let result = StepResult::skipped(
                    step.id.clone(),
                    step.name.clone(),
                    step.action.clone(),
                    "declined by analyst",
                );
                ctx.record_step(&result);
                audit_step_result(audit, ctx, runbook, &result).await;
                let permits_continuation = step.on_error.permits_continuation();
                steps.push(result);
                if !permits_continuation {
                    let remaining: Vec<&crate::core::RunbookStep> = order[idx + 1 ..]
                        .iter()
                        .filter_map(|id| by_id.get(id.as_str()).copied())
                        .collect();
                    for result in skip_unreached(&remaining) {
                        ctx.record_step(&result);
                        steps.push(result);
                    }
                    return TierRunOutcome { steps, halted: true, error: None, simulation: None };
                }
                continue;
            }

            let outcome = execute_step(step, ctx, adapters).await;
            ctx.record_step(&outcome.result);
            audit_step_result(audit, ctx, runbook, &outcome.result).await;
            let should_continue = outcome.should_continue;
            steps.push(outcome.result);
            if !should_continue {
                let remaining: Vec<&crate::core::RunbookStep> = order[idx + 1 ..]
                    .iter()
                    .filter_map(|id| by_id.get(id.as_str()).copied())
                    .collect();
                for result in skip_unreached(&remaining) {
                    ctx.record_step(&result);
                    steps.push(result);
                }
                return TierRunOutcome { steps, halted: true, error: None, simulation: None };
            }
        }

        TierRunOutcome { steps, halted: false, error: None, simulation: None }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::ActionName;
    use crate::core::AutomationLevel;
    use crate::core::ExecutionId;
    use crate::core::ExecutionMode;
    use crate::core::ExecutorName;
    use crate::core::OnError;
    use crate::core::OpaqueMap;
    use crate::core::RunbookConfig;
    use crate::core::RunbookId;
    use crate::core::RunbookStep;
    use crate::core::StepId;
    use crate::runtime::store::InMemoryAuditSink;

    use super::*;

    fn test_audit() -> AuditLog {
        AuditLog::new(Arc::new(InMemoryAuditSink::new()))
    }

    struct AlwaysDeny;

    #[async_trait]
    impl ConfirmationCallback for AlwaysDeny {
        async fn confirm(&self, _action: &str, _resolved_parameters: &Value) -> bool {
            false
        }
    }

    fn runbook_with_one_step() -> Runbook {
        Runbook {
            id: RunbookId::new("rb"),
            version: "1".to_string(),
            name: "rb".to_string(),
            metadata: OpaqueMap::new(),
            triggers: Vec::new(),
            config: RunbookConfig {
                automation_level: AutomationLevel::L0,
                max_execution_time: 60,
                requires_approval: false,
                rollback_on_failure: false,
            },
            steps: vec![RunbookStep {
                id: StepId::new("s1"),
                name: "s1".to_string(),
                action: ActionName::new("query_siem"),
                executor: ExecutorName::new("echo"),
                parameters: OpaqueMap::new(),
                depends_on: Vec::new(),
                condition: None,
                on_error: OnError::Halt,
                timeout: 5,
                approval_required: None,
                rollback: None,
            }],
        }
    }

    #[tokio::test]
    async fn declined_confirmation_records_a_skip_not_a_failure() {
        let mut runbook = runbook_with_one_step();
        runbook.steps[0].on_error = OnError::Continue;
        let mut ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Production,
            None,
        );
        let executor = L0Executor::new(Arc::new(AlwaysDeny));
        let adapters = AdapterRegistry::new();
        let controller = ExecutionController::new();
        let outcome = executor.run(&runbook, &mut ctx, &adapters, &controller, &test_audit()).await;
        assert!(!outcome.halted);
        assert_eq!(outcome.steps.len(), 1);
        assert!(outcome.steps[0].success);
    }

    #[tokio::test]
    async fn declined_confirmation_on_a_halt_step_aborts_further_steps() {
        let runbook = runbook_with_one_step();
        let mut ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Production,
            None,
        );
        let executor = L0Executor::new(Arc::new(AlwaysDeny));
        let adapters = AdapterRegistry::new();
        let controller = ExecutionController::new();
        let outcome = executor.run(&runbook, &mut ctx, &adapters, &controller, &test_audit()).await;
        assert!(outcome.halted);
        assert_eq!(outcome.steps.len(), 1);
        assert!(outcome.steps[0].success);
    }

    #[tokio::test]
    async fn a_dependent_of_an_aborted_step_still_gets_its_own_skip_result() {
        let mut runbook = runbook_with_one_step();
        runbook.steps.push(RunbookStep {
            id: StepId::new("s2"),
            name: "s2".to_string(),
            action: ActionName::new("query_siem"),
            executor: ExecutorName::new("echo"),
            parameters: OpaqueMap::new(),
            depends_on: vec![StepId::new("s1")],
            condition: None,
            on_error: OnError::Halt,
            timeout: 5,
            approval_required: None,
            rollback: None,
        });
        let mut ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Production,
            None,
        );
        let executor = L0Executor::new(Arc::new(AlwaysDeny));
        let adapters = AdapterRegistry::new();
        let controller = ExecutionController::new();
        let outcome = executor.run(&runbook, &mut ctx, &adapters, &controller, &test_audit()).await;
        assert!(outcome.halted);
        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(
            outcome.steps[1].output.as_ref().and_then(|o| o.get("reason")).and_then(Value::as_str),
            Some("Dependencies not met")
        );
    }
}
