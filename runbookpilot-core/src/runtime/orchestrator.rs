// runbookpilot-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Orchestrator
// Description: Composes the scheduler, tier executors, approval queue,
//              audit log, rollback engine, controller, and metrics into one
//              runbook execution.
// Purpose: The single entry point callers (CLI, a future API surface) drive
//          to run a runbook against an alert end to end.
// Dependencies: crate::core, crate::interfaces, crate::runtime::{audit_log,
//               controller, metrics, rollback, scheduler, state_machine,
//               store, tiers}
// ============================================================================

//! ## Overview
//! `Orchestrator::execute` is the full lifecycle: validate, plan, dispatch
//! under the runbook's declared automation tier, audit every state
//! transition and step, roll back on a halting failure when configured to,
//! and persist the final context. A rollback that succeeds completes the
//! execution even though the original run failed — the runbook's net effect
//! on the world was successfully undone, which is the outcome the state
//! machine's `rolling_back -> completed` transition encodes.

use std::sync::Arc;

use crate::core::AuditEventType;
use crate::core::ExecutionContext;
use crate::core::ExecutionId;
use crate::core::ExecutionMode;
use crate::core::ExecutionState;
use crate::core::OpaqueValue;
use crate::core::PredictedOutcome;
use crate::core::Runbook;
use crate::core::SimulationReport;
use crate::core::StepResult;
use crate::interfaces::Adapter;
use crate::interfaces::AuditSink;
use crate::interfaces::RunStateStore;
use serde_json::json;

use super::approval_queue::ApprovalQueue;
use super::audit_log::AuditLog;
use super::controller::AbortReason;
use super::controller::ExecutionController;
use super::controller::LifecycleCallback;
use super::enrichment::EnrichmentRegistry;
use super::metrics::SimulationMetricsCollector;
use super::rollback::RollbackEngine;
use super::scheduler::AdapterRegistry;
use super::state_machine::Event;
use super::state_machine::StateMachine;
use super::tiers::AlwaysApprove;
use super::tiers::AlwaysConfirm;
use super::tiers::ApprovalCallback;
use super::tiers::ConfirmationCallback;
use super::tiers::L0Executor;
use super::tiers::L1Executor;
use super::tiers::L2Executor;
use super::tiers::TierExecutor;

/// Analyst-facing callbacks the orchestrator consults during a run.
pub struct OrchestratorCallbacks {
    /// Consulted by L0 before every step.
    pub confirm: Arc<dyn ConfirmationCallback>,
    /// Consulted by L1 for every write step's approval request.
    pub approve: Arc<dyn ApprovalCallback>,
}

impl Default for OrchestratorCallbacks {
    fn default() -> Self {
        Self { confirm: Arc::new(AlwaysConfirm), approve: Arc::new(AlwaysApprove) }
    }
}

/// The outcome of one full orchestrated run.
pub struct ExecutionResult {
    /// The final execution context, including every step's recorded output.
    pub context: ExecutionContext,
    /// Whether the execution reached a successful terminal state.
    pub success: bool,
    /// Per-step results, in dispatch order.
    pub steps: Vec<StepResult>,
    /// Populated only when the runbook ran under the L2 tier.
    pub simulation: Option<SimulationReport>,
    /// Structured `{code, message}` error payload when `success` is false.
    pub error: Option<OpaqueValue>,
}

/// Errors the orchestrator itself (as opposed to a step or the runbook under
/// execution) can raise.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The run-state store failed to persist a snapshot.
    #[error("failed to persist execution state: {0}")]
    Orchestration(String),
}

/// Runs one runbook against one alert end to end.
pub struct Orchestrator {
    adapters: Arc<AdapterRegistry>,
    enrichment: Arc<EnrichmentRegistry>,
    approval_queue: Arc<ApprovalQueue>,
    audit_log: Arc<AuditLog>,
    run_state_store: Arc<dyn RunStateStore>,
    controller: ExecutionController,
    metrics: Arc<SimulationMetricsCollector>,
    l2_enabled: bool,
}

impl Orchestrator {
    /// Assembles an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        adapters: Arc<AdapterRegistry>,
        approval_queue: Arc<ApprovalQueue>,
        audit_sink: Arc<dyn AuditSink>,
        run_state_store: Arc<dyn RunStateStore>,
        metrics: Arc<SimulationMetricsCollector>,
        l2_enabled: bool,
    ) -> Self {
        Self {
            adapters,
            enrichment: Arc::new(EnrichmentRegistry::new()),
            approval_queue,
            audit_log: Arc::new(AuditLog::new(audit_sink)),
            run_state_store,
            controller: ExecutionController::new(),
            metrics,
            l2_enabled,
        }
    }

    /// Registers a single adapter under the given executor name.
    pub fn register_adapter(&self, executor_name: impl Into<String>, adapter: Arc<dyn Adapter>) {
        self.adapters.register(executor_name, adapter);
    }

    /// Registers a pre-execution enrichment source.
    pub fn register_enrichment_source(&self, source: Arc<dyn crate::interfaces::EnrichmentSource>, enabled: bool) {
        self.enrichment.register(source, enabled);
    }

    /// Returns the shared execution controller, so callers can cancel a
    /// running execution from outside the orchestrator.
    #[must_use]
    pub const fn controller(&self) -> &ExecutionController {
        &self.controller
    }

    /// Runs `runbook` against `alert` under `mode`, driving it through the
    /// state machine to a terminal state. Always returns `Ok`: a runbook that
    /// fails structural validation still produces an
    /// [`ExecutionResult`] with `success: false` and a failed terminal
    /// state, recorded in the audit log exactly like any other halting
    /// failure.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::Orchestration`] only if the run-state
    /// store itself fails to persist the execution.
    pub async fn execute(
        &self,
        runbook: &Runbook,
        alert: Option<crate::core::Alert>,
        mode: ExecutionMode,
        callbacks: &OrchestratorCallbacks,
    ) -> Result<ExecutionResult, OrchestratorError> {
        let execution_id = ExecutionId::generate();
        let mut ctx =
            ExecutionContext::new(execution_id.clone(), runbook.id.clone(), runbook.version.clone(), mode, alert);
        let mut state_machine = StateMachine::new(execution_id.clone());

        self.controller.start_execution(
            execution_id.clone(),
            std::time::Duration::from_secs(runbook.config.max_execution_time),
            Some(Arc::new(NoopLifecycle)),
        );

        self.audit(&execution_id, &runbook.id, AuditEventType::ExecutionStarted, "engine", json!({"mode": format!("{mode:?}")})).await;

        self.apply_and_audit(&mut state_machine, &mut ctx, &runbook.id, Event::Validate).await;

        if let Err(validation_error) = runbook.validate() {
            self.apply_and_audit(&mut state_machine, &mut ctx, &runbook.id, Event::ValidationFailed).await;
            self.audit(
                &execution_id,
                &runbook.id,
                AuditEventType::ExecutionFailed,
                "engine",
                json!({"code": "VALIDATION_FAILED", "message": validation_error.to_string()}),
            )
            .await;
            ctx.error = Some(json!({"code": "VALIDATION_FAILED", "message": validation_error.to_string()}));
            self.controller.complete_execution(&execution_id).ok();
            self.run_state_store
                .save(&ctx)
                .await
                .map_err(|err| OrchestratorError::Orchestration(err.to_string()))?;
            return Ok(ExecutionResult {
                error: ctx.error.clone(),
                context: ctx,
                success: false,
                steps: Vec::new(),
                simulation: None,
            });
        }

        self.apply_and_audit(&mut state_machine, &mut ctx, &runbook.id, Event::ValidationPassed).await;

        if let Some(alert) = &ctx.alert {
            let enrichment = self.enrichment.enrich(json!(alert.document)).await;
            ctx.variables.insert("enrichment".to_string(), json!(enrichment.enriched_context));
        }

        let gate = self.gate_on_approval(runbook, &mut ctx, &mut state_machine, callbacks).await;
        if let Some((success, error)) = gate {
            ctx.state = state_machine.state();
            ctx.error = error.clone();
            self.controller.cancel_execution(&execution_id, "approval_gate_denied").ok();
            self.run_state_store
                .save(&ctx)
                .await
                .map_err(|err| OrchestratorError::Orchestration(err.to_string()))?;
            return Ok(ExecutionResult { context: ctx, success, steps: Vec::new(), simulation: None, error });
        }
        ctx.state = state_machine.state();

        let tier_outcome = self.dispatch(runbook, &mut ctx, callbacks).await;

        if let Some(report) = &tier_outcome.simulation {
            self.metrics.record_simulation(report.predicted_outcome, report.overall_confidence, report.overall_risk_score);
        }

        let halting_error = tier_outcome.error.clone().or_else(|| {
            tier_outcome
                .steps
                .iter()
                .find(|step| !step.success)
                .map(|step| step.error.clone().unwrap_or_else(|| json!({"code": "STEP_EXECUTION_ERROR"})))
        });

        let (success, final_error) = if tier_outcome.halted && halting_error.is_some() {
            self.handle_failure(runbook, &mut ctx, &mut state_machine, &tier_outcome.steps).await
        } else {
            state_machine.apply(Event::AllStepsCompleted).ok();
            ctx.state = state_machine.state();
            self.audit(&execution_id, &runbook.id, AuditEventType::ExecutionCompleted, "engine", json!({})).await;
            (true, None)
        };

        ctx.state = state_machine.state();
        ctx.error = final_error.clone();
        self.controller.complete_execution(&execution_id).ok();
        self.run_state_store
            .save(&ctx)
            .await
            .map_err(|err| OrchestratorError::Orchestration(err.to_string()))?;

        Ok(ExecutionResult { context: ctx, success, steps: tier_outcome.steps, simulation: tier_outcome.simulation, error: final_error })
    }

    /// Gates a run on an analyst decision before it is allowed to proceed
    /// past `planning`, per `runbook.config.requires_approval` (L2 only).
    /// Returns `Some((success, error))` when the run should stop here
    /// (the gate was denied or could not be persisted); `None` when the
    /// caller should continue on to [`Self::dispatch`].
    async fn gate_on_approval(
        &self,
        runbook: &Runbook,
        ctx: &mut ExecutionContext,
        state_machine: &mut StateMachine,
        callbacks: &OrchestratorCallbacks,
    ) -> Option<(bool, Option<OpaqueValue>)> {
        let gated =
            matches!(runbook.config.automation_level, crate::core::AutomationLevel::L2) && runbook.config.requires_approval;

        if !gated {
            self.apply_and_audit(state_machine, ctx, &runbook.id, Event::PlanReady).await;
            return None;
        }

        state_machine.apply(Event::ApprovalRequired).ok();
        self.audit(
            &ctx.execution_id,
            &runbook.id,
            AuditEventType::ApprovalRequested,
            "engine",
            json!({"reason": "l2 simulation gate"}),
        )
        .await;

        let request = crate::core::ApprovalRequest::new(
            ctx.execution_id.clone(),
            runbook.id.clone(),
            runbook.name.clone(),
            crate::core::StepId::new("__l2_simulation_gate__"),
            "L2 simulation gate".to_string(),
            crate::core::ActionName::new("run_simulation"),
            json!({}),
            None,
            3600,
        );
        let Ok(request) = self.approval_queue.create(request).await else {
            state_machine.apply(Event::Cancel).ok();
            return Some((
                false,
                Some(json!({"code": "ORCHESTRATION_ERROR", "message": "failed to persist L2 approval gate"})),
            ));
        };

        if callbacks.approve.decide(&request).await {
            self.approval_queue.approve(&request.request_id, "engine").await.ok();
            self.audit(&ctx.execution_id, &runbook.id, AuditEventType::ApprovalGranted, "engine", json!({})).await;
            state_machine.apply(Event::Approved).ok();
            None
        } else {
            self.approval_queue.deny(&request.request_id, "engine", "declined by analyst").await.ok();
            self.audit(&ctx.execution_id, &runbook.id, AuditEventType::ApprovalDenied, "engine", json!({})).await;
            state_machine.apply(Event::Cancel).ok();
            Some((false, Some(json!({"code": "APPROVAL_DENIED", "message": "L2 simulation gate denied"}))))
        }
    }

    async fn dispatch(
        &self,
        runbook: &Runbook,
        ctx: &mut ExecutionContext,
        callbacks: &OrchestratorCallbacks,
    ) -> super::tiers::TierRunOutcome {
        match runbook.config.automation_level {
            crate::core::AutomationLevel::L0 => {
                L0Executor::new(Arc::clone(&callbacks.confirm))
                    .run(runbook, ctx, &self.adapters, &self.controller, &self.audit_log)
                    .await
            }
            crate::core::AutomationLevel::L1 => {
                L1Executor::new(Arc::clone(&self.approval_queue), Arc::clone(&callbacks.approve))
                    .run(runbook, ctx, &self.adapters, &self.controller, &self.audit_log)
                    .await
            }
            crate::core::AutomationLevel::L2 => {
                L2Executor::new(self.l2_enabled).run(runbook, ctx, &self.adapters, &self.controller, &self.audit_log).await
            }
        }
    }

    async fn handle_failure(
        &self,
        runbook: &Runbook,
        ctx: &mut ExecutionContext,
        state_machine: &mut StateMachine,
        completed: &[StepResult],
    ) -> (bool, Option<OpaqueValue>) {
        let can_roll_back = runbook.config.rollback_on_failure && completed.iter().any(|step| step.success);

        if !can_roll_back {
            state_machine.apply(Event::StepFailed).ok();
            self.audit(&ctx.execution_id, &runbook.id, AuditEventType::ExecutionFailed, "engine", json!({})).await;
            return (false, Some(json!({"code": "ORCHESTRATION_ERROR", "message": "execution halted and no rollback was attempted"})));
        }

        state_machine.apply(Event::StartRollback).ok();
        self.audit(&ctx.execution_id, &runbook.id, AuditEventType::RollbackStarted, "engine", json!({})).await;

        let rollback_outcome = RollbackEngine::run(runbook, ctx, completed, &self.adapters).await;
        self.metrics.record_rollback_triggered();

        if rollback_outcome.success {
            state_machine.apply(Event::RollbackCompleted).ok();
            self.audit(
                &ctx.execution_id,
                &runbook.id,
                AuditEventType::RollbackCompleted,
                "engine",
                json!({"total_attempted": rollback_outcome.total_attempted}),
            )
            .await;
            (true, None)
        } else {
            state_machine.apply(Event::RollbackFailed).ok();
            self.audit(
                &ctx.execution_id,
                &runbook.id,
                AuditEventType::RollbackFailed,
                "engine",
                json!({"total_failed": rollback_outcome.total_failed}),
            )
            .await;
            (
                false,
                Some(json!({
                    "code": "ROLLBACK_FAIL",
                    "message": format!("{} of {} rollback steps failed", rollback_outcome.total_failed, rollback_outcome.total_attempted),
                })),
            )
        }
    }

    async fn audit(
        &self,
        execution_id: &ExecutionId,
        runbook_id: &crate::core::RunbookId,
        event_type: AuditEventType,
        actor: &str,
        details: OpaqueValue,
    ) {
        let _ = self.audit_log.append(execution_id, runbook_id, event_type, actor, details).await;
    }

    /// Applies `event` to `state_machine`, syncs `ctx.state`, and audits the
    /// transition as a `state_changed` event. Used for the transitions
    /// (`validate`, `validation_passed`, `plan_ready`) that carry no other
    /// dedicated audit event of their own.
    async fn apply_and_audit(
        &self,
        state_machine: &mut StateMachine,
        ctx: &mut ExecutionContext,
        runbook_id: &crate::core::RunbookId,
        event: Event,
    ) {
        let from = state_machine.state();
        if state_machine.apply(event).is_ok() {
            ctx.state = state_machine.state();
            self.audit(
                &ctx.execution_id,
                runbook_id,
                AuditEventType::StateChanged,
                "engine",
                json!({"from": format!("{from:?}"), "to": format!("{:?}", ctx.state)}),
            )
            .await;
        }
    }
}

struct NoopLifecycle;

#[async_trait::async_trait]
impl LifecycleCallback for NoopLifecycle {
    async fn call(&self, _execution_id: &ExecutionId, _reason: AbortReason) {}
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::core::ActionName;
    use crate::core::AutomationLevel;
    use crate::core::ExecutorName;
    use crate::core::OnError;
    use crate::core::OpaqueMap;
    use crate::core::RunbookConfig;
    use crate::core::RunbookId;
    use crate::core::RunbookStep;
    use crate::core::StepId;
    use crate::interfaces::AdapterResult;
    use crate::runtime::store::InMemoryApprovalStore;
    use crate::runtime::store::InMemoryAuditSink;
    use crate::runtime::store::InMemoryRunStateStore;

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

    struct AlwaysFailAdapter;

    #[async_trait]
    impl Adapter for AlwaysFailAdapter {
        async fn execute(&self, action: &str, _params: &OpaqueValue, _mode: ExecutionMode) -> AdapterResult {
            AdapterResult {
                success: false,
                action: action.to_string(),
                executor: "fail".to_string(),
                duration_ms: 1,
                output: None,
                error: Some(crate::interfaces::AdapterError {
                    code: "FORCED_FAILURE".to_string(),
                    message: "forced".to_string(),
                    adapter: "fail".to_string(),
                    action: action.to_string(),
                    retryable: false,
                }),
            }
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(
            Arc::new(AdapterRegistry::new()),
            Arc::new(ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new()))),
            Arc::new(InMemoryAuditSink::new()),
            Arc::new(InMemoryRunStateStore::new()),
            Arc::new(SimulationMetricsCollector::new()),
            true,
        )
    }

    fn one_step_runbook(action: &str, on_error: OnError, rollback_on_failure: bool) -> Runbook {
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
                rollback_on_failure,
            },
            steps: vec![RunbookStep {
                id: StepId::new("s1"),
                name: "s1".to_string(),
                action: ActionName::new(action),
                executor: ExecutorName::new("echo"),
                parameters: OpaqueMap::new(),
                depends_on: Vec::new(),
                condition: None,
                on_error,
                timeout: 5,
                approval_required: None,
                rollback: None,
            }],
        }
    }

    #[tokio::test]
    async fn successful_l0_run_completes() {
        let orchestrator = orchestrator();
        orchestrator.register_adapter("echo", Arc::new(EchoAdapter));
        let runbook = one_step_runbook("query_siem", OnError::Halt, false);
        let callbacks = OrchestratorCallbacks::default();
        let result =
            orchestrator.execute(&runbook, None, ExecutionMode::Production, &callbacks).await.unwrap_or_else(|_| unreachable!("valid runbook"));
        assert!(result.success);
        assert_eq!(result.context.state, ExecutionState::Completed);
    }

    #[tokio::test]
    async fn failing_step_without_rollback_ends_failed() {
        let orchestrator = orchestrator();
        orchestrator.register_adapter("echo", Arc::new(AlwaysFailAdapter));
        let runbook = one_step_runbook("query_siem", OnError::Halt, false);
        let callbacks = OrchestratorCallbacks::default();
        let result =
            orchestrator.execute(&runbook, None, ExecutionMode::Production, &callbacks).await.unwrap_or_else(|_| unreachable!("valid runbook"));
        assert!(!result.success);
        assert_eq!(result.context.state, ExecutionState::Failed);
    }

    #[tokio::test]
    async fn validation_failure_is_reported_before_execution_begins() {
        let orchestrator = orchestrator();
        let mut runbook = one_step_runbook("query_siem", OnError::Halt, false);
        runbook.steps.clear();
        let callbacks = OrchestratorCallbacks::default();
        let result = orchestrator
            .execute(&runbook, None, ExecutionMode::Production, &callbacks)
            .await
            .unwrap_or_else(|_| unreachable!("run-state store never fails in tests"));
        assert!(!result.success);
        assert_eq!(result.context.state, ExecutionState::Failed);
        assert_eq!(
            result.error.and_then(|e| e.get("code").and_then(serde_json::Value::as_str).map(String::from)),
            Some("VALIDATION_FAILED".to_string())
        );
    }

    struct DenyEverything;

    #[async_trait]
    impl ApprovalCallback for DenyEverything {
        async fn decide(&self, _request: &crate::core::ApprovalRequest) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn l2_requires_approval_gate_denial_cancels_before_simulation_runs() {
        let orchestrator = orchestrator();
        let mut runbook = one_step_runbook("isolate_host", OnError::Halt, false);
        runbook.config.automation_level = AutomationLevel::L2;
        runbook.config.requires_approval = true;
        let callbacks = OrchestratorCallbacks { confirm: Arc::new(AlwaysConfirm), approve: Arc::new(DenyEverything) };
        let result =
            orchestrator.execute(&runbook, None, ExecutionMode::Simulation, &callbacks).await.unwrap_or_else(|_| unreachable!("valid runbook"));
        assert!(!result.success);
        assert_eq!(result.context.state, ExecutionState::Cancelled);
        assert!(result.simulation.is_none());
        assert_eq!(
            result.error.and_then(|e| e.get("code").and_then(serde_json::Value::as_str).map(String::from)),
            Some("APPROVAL_DENIED".to_string())
        );
    }
}
