// runbookpilot-core/src/runtime/tiers/l1.rs
// ============================================================================
// Module: L1 Tier Executor
// Description: Semi-automated walk: reads auto-execute, writes gate behind
//              an approval-queue round trip.
// Purpose: The default production tier for mature runbooks.
// Dependencies: crate::core, crate::runtime::{approval_queue, classifier,
//               scheduler, template_context}
// ============================================================================

//! ## Overview
//! A step's gating is decided by [`crate::runtime::classifier::classify`]
//! unless the step's own `approval_required` overrides it. A denied approval
//! is recorded as a failed [`crate::core::StepResult`] carrying
//! `APPROVAL_DENIED` (the step itself was never dispatched), and the walk
//! halts or continues past it exactly as an ordinary step failure would,
//! per the denied step's own `on_error` policy. Every step the walk never
//! reaches after a halt still gets its own "Dependencies not met" skip
//! result.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::core::ApprovalRequest;
use crate::core::AuditEventType;
use crate::core::ExecutionContext;
use crate::core::Runbook;
use crate::core::StepResult;
use crate::runtime::approval_queue::ApprovalQueue;
use crate::runtime::audit_log::AuditLog;
use crate::runtime::classifier::ActionClass;
use crate::runtime::classifier::classify;
use crate::runtime::controller::ExecutionController;
use crate::runtime::scheduler::AdapterRegistry;
use crate::runtime::scheduler::execute_step;
use crate::runtime::scheduler::resolve_parameters;
use crate::runtime::scheduler::skip_unreached;
use crate::runtime::scheduler::topological_order;
use crate::runtime::template_context;

use super::ApprovalCallback;
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

/// Records a "Dependencies not met" skip result for every step id in
/// `remaining_ids` the walk will never reach because it just halted.
fn push_unreached(
    ctx: &mut ExecutionContext,
    steps: &mut Vec<StepResult>,
    remaining_ids: &[crate::core::StepId],
    by_id: &std::collections::BTreeMap<&str, &crate::core::RunbookStep>,
) {
    let remaining: Vec<&crate::core::RunbookStep> =
        remaining_ids.iter().filter_map(|id| by_id.get(id.as_str()).copied()).collect();
    for result in skip_unreached(&remaining) {
        ctx.record_step(&result);
        steps.push(result);
    }
}

/// Seconds a write step's approval request stays decidable before expiring.
const APPROVAL_TTL_SECONDS: i64 = 3600;

/// Auto-executes read steps; gates write steps behind an approval request.
pub struct L1Executor {
    queue: Arc<ApprovalQueue>,
    approve: Arc<dyn ApprovalCallback>,
}

impl L1Executor {
    /// Creates an executor backed by `queue` and decided via `approve`.
    #[must_use]
    pub fn new(queue: Arc<ApprovalQueue>, approve: Arc<dyn ApprovalCallback>) -> Self {
        Self { queue, approve }
    }

    fn requires_approval(&self, step: &crate::core::RunbookStep) -> bool {
        step.approval_required.unwrap_or_else(|| matches!(classify(step.action.as_str()), ActionClass::Write))
    }
}

#[async_trait]
impl TierExecutor for L1Executor {
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
                push_unreached(ctx, &mut steps, &order[idx ..], &by_id);
                return TierRunOutcome { steps, halted: true, error: None, simulation: None };
            }

            let _ = audit
                .append(
                    &ctx.execution_id,
                    &runbook.id,
                    AuditEventType::StepStarted,
                    "engine",
                    json!({"step_id": step.id.as_str(), "action": step.action.as_str()}),
                )
                .await;

            if self.requires_approval(step) {
                let built = template_context::build(ctx);
                let alert_value = ctx.alert.as_ref().map(|alert| json!(alert.document));
                let resolved_params = resolve_parameters(&step.parameters, alert_value.as_ref(), &built);

                let _ = audit
                    .append(
                        &ctx.execution_id,
                        &runbook.id,
                        AuditEventType::ApprovalRequested,
                        "engine",
                        json!({"step_id": step.id.as_str()}),
                    )
                    .await;

                let request = ApprovalRequest::new(
                    ctx.execution_id.clone(),
                    runbook.id.clone(),
                    runbook.name.clone(),
                    step.id.clone(),
                    step.name.clone(),
                    step.action.clone(),
                    resolved_params,
                    None,
                    APPROVAL_TTL_SECONDS,
                );
                let Ok(request) = self.queue.create(request).await else {
                    let result = StepResult {
                        step_id: step.id.clone(),
                        step_name: step.name.clone(),
                        action: step.action.clone(),
                        success: false,
                        started_at: crate::core::Timestamp::now(),
                        completed_at: crate::core::Timestamp::now(),
                        duration_ms: 0,
                        output: None,
                        error: Some(json!({"code": "APPROVAL_QUEUE_ERROR", "message": "failed to persist approval request"})),
                    };
                    ctx.record_step(&result);
                    audit_step_result(audit, ctx, runbook, &result).await;
                    steps.push(result);
                    push_unreached(ctx, &mut steps, &order[idx + 1 ..], &by_id);
                    return TierRunOutcome { steps, halted: true, error: None, simulation: None };
                };
                let _ = audit
                    .append(
                        &ctx.execution_id,
                        &runbook.id,
                        AuditEventType::ApprovalQueueCreated,
                        "engine",
                        json!({"request_id": request.request_id.as_str(), "step_id": step.id.as_str()}),
                    )
                    .await;

                let approved = self.approve.decide(&request).await;
                if approved {
                    self.queue.approve(&request.request_id, "engine").await.ok();
                    let _ = audit
                        .append(&ctx.execution_id, &runbook.id, AuditEventType::ApprovalGranted, "engine", json!({"step_id": step.id.as_str()}))
                        .await;
                    let _ = audit
                        .append(
                            &ctx.execution_id,
                            &runbook.id,
                            AuditEventType::ApprovalQueueExecuted,
                            "engine",
                            json!({"request_id": request.request_id.as_str(), "step_id": step.id.as_str(), "decision": "approved"}),
                        )
                        .await;
                } else {
                    self.queue.deny(&request.request_id, "engine", "declined by analyst").await.ok();
                    let _ = audit
                        .append(&ctx.execution_id, &runbook.id, AuditEventType::ApprovalDenied, "engine", json!({"step_id": step.id.as_str()}))
                        .await;
                    let now = crate::core::Timestamp::now();
                    let result = StepResult {
                        step_id: step.id.clone(),
                        step_name: step.name.clone(),
                        action: step.action.clone(),
                        success: false,
                        started_at: now,
                        completed_at: now,
                        duration_ms: 0,
                        output: None,
                        error: Some(json!({
                            "code": "APPROVAL_DENIED",
                            "message": format!("approval denied for step '{}'", step.id.as_str()),
                        })),
                    };
                    ctx.record_step(&result);
                    audit_step_result(audit, ctx, runbook, &result).await;
                    let _ = audit
                        .append(
                            &ctx.execution_id,
                            &runbook.id,
                            AuditEventType::ApprovalQueueExecuted,
                            "engine",
                            json!({"request_id": request.request_id.as_str(), "step_id": step.id.as_str(), "decision": "denied"}),
                        )
                        .await;
                    let permits_continuation = step.on_error.permits_continuation();
                    steps.push(result);
                    if !permits_continuation {
                        push_unreached(ctx, &mut steps, &order[idx + 1 ..], &by_id);
                        return TierRunOutcome {
                            steps,
                            halted: true,
                            error: Some(json!({
                                "code": "APPROVAL_DENIED",
                                "message": format!("approval denied for step '{}'", step.id.as_str()),
                            })),
                            simulation: None,
                        };
                    }
                    continue;
                }
            }

            let outcome = execute_step(step, ctx, adapters).await;
            ctx.record_step(&outcome.result);
            audit_step_result(audit, ctx, runbook, &outcome.result).await;
            let should_continue = outcome.should_continue;
            steps.push(outcome.result);
            if !should_continue {
                push_unreached(ctx, &mut steps, &order[idx + 1 ..], &by_id);
                return TierRunOutcome { steps, halted: true, error: None, simulation: None };
            }
        }

        TierRunOutcome { steps, halted: false, error: None, simulation: None }
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
    use crate::core::OpaqueMap;
    use crate::core::RunbookConfig;
    use crate::core::RunbookId;
    use crate::core::RunbookStep;
    use crate::core::StepId;
    use crate::interfaces::Adapter;
    use crate::interfaces::AdapterResult;
    use crate::runtime::store::InMemoryApprovalStore;
    use crate::runtime::store::InMemoryAuditSink;

    use super::*;

    fn test_audit() -> AuditLog {
        AuditLog::new(Arc::new(InMemoryAuditSink::new()))
    }

    struct EchoAdapter;

    #[async_trait]
    impl Adapter for EchoAdapter {
        async fn execute(&self, action: &str, params: &crate::core::OpaqueValue, _mode: ExecutionMode) -> AdapterResult {
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

    struct AlwaysApprove;

    #[async_trait]
    impl ApprovalCallback for AlwaysApprove {
        async fn decide(&self, _request: &ApprovalRequest) -> bool {
            true
        }
    }

    struct AlwaysDeny;

    #[async_trait]
    impl ApprovalCallback for AlwaysDeny {
        async fn decide(&self, _request: &ApprovalRequest) -> bool {
            false
        }
    }

    fn runbook_with_write_step() -> Runbook {
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
                rollback_on_failure: false,
            },
            steps: vec![RunbookStep {
                id: StepId::new("s1"),
                name: "s1".to_string(),
                action: ActionName::new("block_ip"),
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

    fn runbook_with_read_step() -> Runbook {
        let mut rb = runbook_with_write_step();
        rb.steps[0].action = ActionName::new("query_siem");
        rb
    }

    #[tokio::test]
    async fn read_steps_auto_execute_without_an_approval_round_trip() {
        let runbook = runbook_with_read_step();
        let mut ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Production,
            None,
        );
        let queue = Arc::new(ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new())));
        let executor = L1Executor::new(queue, Arc::new(AlwaysDeny));
        let adapters = AdapterRegistry::new();
        adapters.register("echo", Arc::new(EchoAdapter));
        let controller = ExecutionController::new();
        let outcome = executor.run(&runbook, &mut ctx, &adapters, &controller, &test_audit()).await;
        assert!(!outcome.halted);
        assert!(outcome.steps[0].success);
    }

    #[tokio::test]
    async fn write_steps_dispatch_only_after_approval() {
        let runbook = runbook_with_write_step();
        let mut ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Production,
            None,
        );
        let queue = Arc::new(ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new())));
        let executor = L1Executor::new(queue, Arc::new(AlwaysApprove));
        let adapters = AdapterRegistry::new();
        adapters.register("echo", Arc::new(EchoAdapter));
        let controller = ExecutionController::new();
        let outcome = executor.run(&runbook, &mut ctx, &adapters, &controller, &test_audit()).await;
        assert!(!outcome.halted);
        assert!(outcome.steps[0].success);
    }

    #[tokio::test]
    async fn denied_approval_halts_with_a_structured_reason() {
        let runbook = runbook_with_write_step();
        let mut ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Production,
            None,
        );
        let queue = Arc::new(ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new())));
        let executor = L1Executor::new(queue, Arc::new(AlwaysDeny));
        let adapters = AdapterRegistry::new();
        adapters.register("echo", Arc::new(EchoAdapter));
        let controller = ExecutionController::new();
        let outcome = executor.run(&runbook, &mut ctx, &adapters, &controller, &test_audit()).await;
        assert!(outcome.halted);
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(
            outcome.steps[0].error.as_ref().and_then(|e| e.get("code")).and_then(serde_json::Value::as_str),
            Some("APPROVAL_DENIED")
        );
        assert_eq!(
            outcome.error.and_then(|e| e.get("code").and_then(serde_json::Value::as_str).map(String::from)),
            Some("APPROVAL_DENIED".to_string())
        );
    }

    #[tokio::test]
    async fn denied_approval_on_a_continue_step_proceeds_to_dependents() {
        let mut runbook = runbook_with_write_step();
        runbook.steps[0].on_error = OnError::Continue;
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
        let queue = Arc::new(ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new())));
        let executor = L1Executor::new(queue, Arc::new(AlwaysDeny));
        let adapters = AdapterRegistry::new();
        adapters.register("echo", Arc::new(EchoAdapter));
        let controller = ExecutionController::new();
        let outcome = executor.run(&runbook, &mut ctx, &adapters, &controller, &test_audit()).await;
        assert!(!outcome.halted);
        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(
            outcome.steps[0].error.as_ref().and_then(|e| e.get("code")).and_then(serde_json::Value::as_str),
            Some("APPROVAL_DENIED")
        );
        assert!(outcome.steps[1].success);
    }
}
