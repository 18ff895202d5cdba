// runbookpilot-core/src/runtime/rollback.rs
// ============================================================================
// Module: Rollback Engine
// Description: Reverse-order, best-effort compensation over a failed
//              execution's successful steps.
// Purpose: Run every completed step's declared RollbackSpec, in reverse
//          dispatch order, without letting one failure stop the rest.
// Dependencies: crate::core, crate::runtime::{scheduler, template_context}
// ============================================================================

//! ## Overview
//! Rollback is best-effort: a failing compensating action is recorded and
//! the engine moves on to the next one rather than halting, since stopping
//! partway would leave the system in a worse, partially-reverted state than
//! continuing would.

use std::time::Duration;

use serde_json::json;

use crate::core::ExecutionContext;
use crate::core::Runbook;
use crate::core::StepResult;
use crate::core::Timestamp;
use crate::runtime::scheduler::AdapterRegistry;
use crate::runtime::scheduler::resolve_parameters;
use crate::runtime::template_context;

/// Outcome of one rollback run.
#[derive(Debug, Clone)]
pub struct RollbackOutcome {
    /// Whether every attempted compensation succeeded.
    pub success: bool,
    /// Per-step rollback results, in the order they were attempted (reverse
    /// of dispatch order).
    pub steps_rolled_back: Vec<StepResult>,
    /// How many steps had a rollback clause and were attempted.
    pub total_attempted: u64,
    /// How many attempted compensations succeeded.
    pub total_succeeded: u64,
    /// How many attempted compensations failed.
    pub total_failed: u64,
    /// Wall-clock duration of the whole rollback run, in milliseconds.
    pub duration_ms: i64,
}

/// Walks a failed execution's successfully completed steps in reverse order,
/// dispatching each one's declared `rollback` clause.
pub struct RollbackEngine;

impl RollbackEngine {
    /// Runs rollback for every step in `completed` (in the order given by the
    /// caller; callers pass dispatch order, this function reverses it) that
    /// both succeeded and carries a `rollback` clause.
    pub async fn run(
        runbook: &Runbook,
        ctx: &ExecutionContext,
        completed: &[StepResult],
        adapters: &AdapterRegistry,
    ) -> RollbackOutcome {
        let started_at = Timestamp::now();
        let by_id: std::collections::BTreeMap<&str, &crate::core::RunbookStep> =
            runbook.steps.iter().map(|step| (step.id.as_str(), step)).collect();

        let mut steps_rolled_back = Vec::new();
        let mut total_succeeded = 0u64;
        let mut total_failed = 0u64;

        for result in completed.iter().rev() {
            if !result.success {
                continue;
            }
            let Some(step) = by_id.get(result.step_id.as_str()).copied() else { continue };
            let Some(rollback) = &step.rollback else { continue };

            let executor_name = rollback.executor.as_ref().unwrap_or(&step.executor);
            let Some(adapter) = adapters.get(executor_name.as_str()) else {
                total_failed += 1;
                steps_rolled_back.push(failed(
                    step.id.clone(),
                    step.name.clone(),
                    rollback.action.clone(),
                    "ROLLBACK_ADAPTER_NOT_FOUND",
                    &format!("no adapter registered for executor '{}'", executor_name.as_str()),
                ));
                continue;
            };

            let built = template_context::build(ctx);
            let alert_value = ctx.alert.as_ref().map(|alert| json!(alert.document));
            let resolved_params = resolve_parameters(&rollback.parameters, alert_value.as_ref(), &built);

            let step_started_at = Timestamp::now();
            let dispatch = tokio::time::timeout(
                Duration::from_secs(rollback.timeout),
                adapter.execute(rollback.action.as_str(), &resolved_params, ctx.mode),
            )
            .await;
            let completed_at = Timestamp::now();
            let duration_ms = step_started_at.millis_until(completed_at);

            match dispatch {
                Ok(outcome) if outcome.success => {
                    total_succeeded += 1;
                    steps_rolled_back.push(StepResult {
                        step_id: step.id.clone(),
                        step_name: step.name.clone(),
                        action: rollback.action.clone(),
                        success: true,
                        started_at: step_started_at,
                        completed_at,
                        duration_ms,
                        output: outcome.output,
                        error: None,
                    });
                }
                Ok(outcome) => {
                    total_failed += 1;
                    steps_rolled_back.push(StepResult {
                        step_id: step.id.clone(),
                        step_name: step.name.clone(),
                        action: rollback.action.clone(),
                        success: false,
                        started_at: step_started_at,
                        completed_at,
                        duration_ms,
                        output: None,
                        error: Some(json!({
                            "code": "ROLLBACK_STEP_FAILED",
                            "message": outcome.error.as_ref().map_or("adapter reported failure", |e| e.message.as_str()),
                            "adapter_error": outcome.error,
                        })),
                    });
                }
                Err(_) => {
                    total_failed += 1;
                    steps_rolled_back.push(failed(
                        step.id.clone(),
                        step.name.clone(),
                        rollback.action.clone(),
                        "ROLLBACK_STEP_TIMEOUT",
                        &format!("rollback exceeded its {}s timeout", rollback.timeout),
                    ));
                }
            }
        }

        let completed_at = Timestamp::now();
        RollbackOutcome {
            success: total_failed == 0,
            total_attempted: total_succeeded + total_failed,
            total_succeeded,
            total_failed,
            steps_rolled_back,
            duration_ms: started_at.millis_until(completed_at),
        }
    }
}

fn failed(
    step_id: crate::core::StepId,
    step_name: String,
    action: crate::core::ActionName,
    code: &str,
    message: &str,
) -> StepResult {
    let now = Timestamp::now();
    StepResult {
        step_id,
        step_name,
        action,
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
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::core::ActionName;
    use crate::core::AutomationLevel;
    use crate::core::ExecutionId;
    use crate::core::ExecutionMode;
    use crate::core::ExecutorName;
    use crate::core::OnError;
    use crate::core::OpaqueMap;
    use crate::core::OpaqueValue;
    use crate::core::RollbackSpec;
    use crate::core::RunbookConfig;
    use crate::core::RunbookId;
    use crate::core::RunbookStep;
    use crate::core::StepId;
    use crate::interfaces::Adapter;
    use crate::interfaces::AdapterResult;

    use super::*;

    struct RecordingAdapter;

    #[async_trait]
    impl Adapter for RecordingAdapter {
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

    fn step_with_rollback(id: &str) -> RunbookStep {
        RunbookStep {
            id: StepId::new(id),
            name: id.to_string(),
            action: ActionName::new("isolate_host"),
            executor: ExecutorName::new("echo"),
            parameters: OpaqueMap::new(),
            depends_on: Vec::new(),
            condition: None,
            on_error: OnError::Halt,
            timeout: 5,
            approval_required: None,
            rollback: Some(RollbackSpec {
                action: ActionName::new("restore_host"),
                executor: None,
                parameters: OpaqueMap::new(),
                timeout: 5,
            }),
        }
    }

    fn runbook(steps: Vec<RunbookStep>) -> Runbook {
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

    fn succeeded(step_id: &str) -> StepResult {
        let now = Timestamp::now();
        StepResult {
            step_id: StepId::new(step_id),
            step_name: step_id.to_string(),
            action: ActionName::new("isolate_host"),
            success: true,
            started_at: now,
            completed_at: now,
            duration_ms: 1,
            output: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn successful_steps_with_a_rollback_clause_are_compensated() {
        let runbook = runbook(vec![step_with_rollback("a"), step_with_rollback("b")]);
        let ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Production,
            None,
        );
        let adapters = AdapterRegistry::new();
        adapters.register("echo", Arc::new(RecordingAdapter));
        let completed = vec![succeeded("a"), succeeded("b")];
        let outcome = RollbackEngine::run(&runbook, &ctx, &completed, &adapters).await;
        assert!(outcome.success);
        assert_eq!(outcome.total_attempted, 2);
        assert_eq!(outcome.steps_rolled_back[0].step_id, StepId::new("b"));
        assert_eq!(outcome.steps_rolled_back[1].step_id, StepId::new("a"));
    }

    #[tokio::test]
    async fn missing_adapter_is_recorded_as_a_failed_compensation() {
        let runbook = runbook(vec![step_with_rollback("a")]);
        let ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Production,
            None,
        );
        let adapters = AdapterRegistry::new();
        let completed = vec![succeeded("a")];
        let outcome = RollbackEngine::run(&runbook, &ctx, &completed, &adapters).await;
        assert!(!outcome.success);
        assert_eq!(outcome.total_failed, 1);
    }

    #[tokio::test]
    async fn steps_without_a_rollback_clause_are_skipped() {
        let mut plain = step_with_rollback("a");
        plain.rollback = None;
        let runbook = runbook(vec![plain]);
        let ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Production,
            None,
        );
        let adapters = AdapterRegistry::new();
        let completed = vec![succeeded("a")];
        let outcome = RollbackEngine::run(&runbook, &ctx, &completed, &adapters).await;
        assert_eq!(outcome.total_attempted, 0);
        assert!(outcome.success);
    }
}
