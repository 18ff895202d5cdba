// runbookpilot-core/src/runtime/tiers/l2.rs
// ============================================================================
// Module: L2 Tier Executor
// Description: Simulation walk: read steps execute for real, write steps are
//              scored rather than dispatched.
// Purpose: Produce a SimulationReport an analyst can review before a
//          runbook is ever allowed to mutate anything.
// Dependencies: crate::core, crate::runtime::{classifier, confidence,
//               impact, scheduler, template_context}
// ============================================================================

//! ## Overview
//! An `L2Executor` constructed with `enabled: false`, or asked to run a
//! context whose [`crate::core::ExecutionMode`] isn't `Simulation`, refuses
//! the run outright rather than silently downgrading to a different tier.

use async_trait::async_trait;
use serde_json::json;

use crate::core::AuditEventType;
use crate::core::ExecutionContext;
use crate::core::ExecutionMode;
use crate::core::PredictedOutcome;
use crate::core::Runbook;
use crate::core::RunbookStep;
use crate::core::RollbackPlanEntry;
use crate::core::SimulatedStep;
use crate::core::SimulationId;
use crate::core::SimulationReport;
use crate::runtime::audit_log::AuditLog;
use crate::runtime::classifier::ActionClass;
use crate::runtime::classifier::classify;
use crate::runtime::confidence::ConfidenceInputs;
use crate::runtime::confidence::DetectforgeConfidence;
use crate::runtime::confidence::aggregate_report_confidence;
use crate::runtime::confidence::score_step;
use crate::runtime::controller::ExecutionController;
use crate::runtime::impact;
use crate::runtime::scheduler::AdapterRegistry;
use crate::runtime::scheduler::execute_step;
use crate::runtime::scheduler::resolve_parameters;
use crate::runtime::scheduler::topological_order;
use crate::runtime::template_context;
use crate::runtime::templating::TemplateContext;
use crate::runtime::templating::evaluate_condition;
use crate::runtime::templating::resolve;

use super::TierExecutor;
use super::TierRunOutcome;

/// Scores write steps and executes read steps for real, never dispatching a
/// write action to an adapter.
pub struct L2Executor {
    enabled: bool,
}

impl L2Executor {
    /// Creates a simulation executor. `enabled` gates whether this build is
    /// allowed to run simulations at all.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn disabled_outcome(message: &str) -> TierRunOutcome {
        TierRunOutcome {
            steps: Vec::new(),
            halted: true,
            error: Some(json!({"code": "L2_NOT_IMPLEMENTED", "message": message})),
            simulation: None,
        }
    }
}

#[async_trait]
impl TierExecutor for L2Executor {
    async fn run(
        &self,
        runbook: &Runbook,
        ctx: &mut ExecutionContext,
        adapters: &AdapterRegistry,
        controller: &ExecutionController,
        audit: &AuditLog,
    ) -> TierRunOutcome {
        if !self.enabled {
            return Self::disabled_outcome("L2 simulation is disabled on this deployment");
        }
        if ctx.mode != ExecutionMode::Simulation {
            return Self::disabled_outcome("L2 tier requires execution mode 'simulation'");
        }

        let _ = audit.append(&ctx.execution_id, &runbook.id, AuditEventType::SimulationStarted, "engine", json!({})).await;

        let order = topological_order(runbook);
        let by_id: std::collections::BTreeMap<&str, &RunbookStep> =
            runbook.steps.iter().map(|step| (step.id.as_str(), step)).collect();

        let mut simulated_steps = Vec::new();
        let mut confidences = Vec::new();
        let mut overall_risk_score: u8 = 1;
        let mut risks_identified = Vec::new();
        let mut affected_assets = std::collections::BTreeSet::new();
        let mut rollback_plan = Vec::new();
        let mut estimated_duration_ms: i64 = 0;

        for step_id in &order {
            let Some(step) = by_id.get(step_id.as_str()).copied() else { continue };
            if controller.should_abort(&ctx.execution_id) {
                break;
            }
            estimated_duration_ms += i64::try_from(step.timeout).unwrap_or(i64::MAX).saturating_mul(1000);

            if let Some(condition) = &step.condition {
                let built = template_context::build(ctx);
                let alert_value = ctx.alert.as_ref().map(|alert| json!(alert.document));
                let template_ctx = TemplateContext {
                    alert: alert_value.as_ref(),
                    steps: &built.steps,
                    context: &built.context,
                    env: &built.env,
                };
                let resolved = resolve(&serde_json::Value::String(condition.clone()), &template_ctx).value;
                let resolved_text = match &resolved {
                    serde_json::Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                if !evaluate_condition(&resolved_text) {
                    let result = crate::core::StepResult::skipped(
                        step.id.clone(),
                        step.name.clone(),
                        step.action.clone(),
                        "Condition not met",
                    );
                    ctx.record_step(&result);
                    let _ = audit
                        .append(
                            &ctx.execution_id,
                            &runbook.id,
                            AuditEventType::StepSimulated,
                            "engine",
                            json!({"step_id": step.id.as_str(), "action": step.action.as_str(), "skipped": true}),
                        )
                        .await;
                    simulated_steps.push(SimulatedStep {
                        step_id: step.id.clone(),
                        step_name: step.name.clone(),
                        predicted_result: result.output,
                        confidence: 1.0,
                        side_effects: Vec::new(),
                        rollback_action: None,
                        rollback_parameters: None,
                        validations_passed: true,
                        validation_errors: Vec::new(),
                        is_write_action: matches!(classify(step.action.as_str()), ActionClass::Write),
                        duration_ms: 0,
                        impact: None,
                    });
                    continue;
                }
            }

            match classify(step.action.as_str()) {
                ActionClass::Read => {
                    let outcome = execute_step(step, ctx, adapters).await;
                    ctx.record_step(&outcome.result);
                    let _ = audit
                        .append(
                            &ctx.execution_id,
                            &runbook.id,
                            AuditEventType::StepSimulated,
                            "engine",
                            json!({"step_id": step.id.as_str(), "action": step.action.as_str(), "is_write_action": false}),
                        )
                        .await;
                    simulated_steps.push(SimulatedStep {
                        step_id: step.id.clone(),
                        step_name: step.name.clone(),
                        predicted_result: outcome.result.output.clone(),
                        confidence: 1.0,
                        side_effects: Vec::new(),
                        rollback_action: None,
                        rollback_parameters: None,
                        validations_passed: outcome.result.success,
                        validation_errors: if outcome.result.success {
                            Vec::new()
                        } else {
                            vec!["read dispatch failed".to_string()]
                        },
                        is_write_action: false,
                        duration_ms: outcome.result.duration_ms,
                        impact: None,
                    });
                }
                ActionClass::Write => {
                    let built = template_context::build(ctx);
                    let alert_value = ctx.alert.as_ref().map(|alert| json!(alert.document));
                    let resolved_params = resolve_parameters(&step.parameters, alert_value.as_ref(), &built);
                    let validations_passed = resolved_params.is_object() || resolved_params.is_null();

                    let impact_assessment = impact::assess(step.action.as_str(), &step.parameters, step.rollback.as_ref());
                    if let Some(assessment) = &impact_assessment {
                        overall_risk_score = overall_risk_score.max(assessment.risk_score);
                        if matches!(
                            assessment.risk_level,
                            crate::core::RiskLevel::High | crate::core::RiskLevel::Critical
                        ) {
                            risks_identified.push(assessment.summary.clone());
                        }
                        affected_assets.extend(assessment.blast_radius.keys().cloned());
                    }

                    let detectforge_confidence = ctx
                        .alert
                        .as_ref()
                        .and_then(|alert| alert.field_path("x-detectforge.confidence"))
                        .and_then(serde_json::Value::as_str)
                        .and_then(parse_detectforge_confidence);

                    let confidence = score_step(ConfidenceInputs {
                        parameter_validation: validations_passed,
                        adapter_health: None,
                        rollback_available: impact_assessment.as_ref().is_some_and(|a| a.rollback_available),
                        detectforge_confidence,
                    });
                    confidences.push(confidence);

                    if let Some(rollback) = &step.rollback {
                        rollback_plan.insert(
                            0,
                            RollbackPlanEntry {
                                step_id: step.id.clone(),
                                action: rollback.action.to_string(),
                                parameters: json!(rollback.parameters),
                            },
                        );
                    }

                    let _ = audit
                        .append(
                            &ctx.execution_id,
                            &runbook.id,
                            AuditEventType::StepSimulated,
                            "engine",
                            json!({"step_id": step.id.as_str(), "action": step.action.as_str(), "is_write_action": true, "confidence": confidence}),
                        )
                        .await;

                    simulated_steps.push(SimulatedStep {
                        step_id: step.id.clone(),
                        step_name: step.name.clone(),
                        predicted_result: Some(resolved_params.clone()),
                        confidence,
                        side_effects: impact_assessment
                            .as_ref()
                            .map(|a| vec![a.summary.clone()])
                            .unwrap_or_default(),
                        rollback_action: step.rollback.as_ref().map(|r| r.action.to_string()),
                        rollback_parameters: step.rollback.as_ref().map(|r| json!(r.parameters)),
                        validations_passed,
                        validation_errors: if validations_passed {
                            Vec::new()
                        } else {
                            vec!["resolved parameters are not a JSON object".to_string()]
                        },
                        is_write_action: true,
                        duration_ms: i64::try_from(step.timeout).unwrap_or(i64::MAX).saturating_mul(1000),
                        impact: impact_assessment,
                    });
                }
            }
        }

        let write_count = simulated_steps.iter().filter(|s| s.is_write_action).count();
        let failed_writes = simulated_steps.iter().filter(|s| s.is_write_action && !s.validations_passed).count();
        let predicted_outcome = if simulated_steps.iter().any(|s| !s.validations_passed) {
            if write_count > 0 && failed_writes == write_count {
                PredictedOutcome::Failure
            } else {
                PredictedOutcome::Partial
            }
        } else {
            PredictedOutcome::Success
        };

        let report = SimulationReport {
            simulation_id: SimulationId::generate(),
            execution_id: ctx.execution_id.clone(),
            runbook_id: runbook.id.clone(),
            runbook_name: runbook.name.clone(),
            timestamp: crate::core::Timestamp::now(),
            steps: simulated_steps,
            predicted_outcome,
            overall_confidence: aggregate_report_confidence(&confidences),
            overall_risk_score,
            overall_risk_level: crate::core::RiskLevel::from_score(overall_risk_score),
            estimated_duration_ms,
            risks_identified,
            affected_assets: affected_assets.into_iter().collect(),
            rollback_plan,
            detectforge_confidence: ctx
                .alert
                .as_ref()
                .and_then(|alert| alert.field_path("x-detectforge.confidence"))
                .and_then(serde_json::Value::as_str)
                .map(String::from),
            detectforge_rule_id: ctx
                .alert
                .as_ref()
                .and_then(|alert| alert.field_path("x-detectforge.rule_id"))
                .and_then(serde_json::Value::as_str)
                .map(String::from),
        };

        let completion_event =
            if matches!(predicted_outcome, PredictedOutcome::Failure) { AuditEventType::SimulationFailed } else { AuditEventType::SimulationCompleted };
        let _ = audit
            .append(
                &ctx.execution_id,
                &runbook.id,
                completion_event,
                "engine",
                json!({"simulation_id": report.simulation_id.as_str(), "predicted_outcome": report.predicted_outcome}),
            )
            .await;

        TierRunOutcome { steps: Vec::new(), halted: false, error: None, simulation: Some(report) }
    }
}

fn parse_detectforge_confidence(label: &str) -> Option<DetectforgeConfidence> {
    match label {
        "low" => Some(DetectforgeConfidence::Low),
        "medium" => Some(DetectforgeConfidence::Medium),
        "high" => Some(DetectforgeConfidence::High),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::core::ActionName;
    use crate::core::AutomationLevel;
    use crate::core::ExecutionId;
    use crate::core::ExecutorName;
    use crate::core::OnError;
    use crate::core::OpaqueMap;
    use crate::core::RunbookConfig;
    use crate::core::RunbookId;
    use crate::core::StepId;
    use crate::runtime::store::InMemoryAuditSink;

    use super::*;

    fn test_audit() -> AuditLog {
        AuditLog::new(std::sync::Arc::new(InMemoryAuditSink::new()))
    }

    fn write_step_runbook() -> Runbook {
        Runbook {
            id: RunbookId::new("rb"),
            version: "1".to_string(),
            name: "rb".to_string(),
            metadata: OpaqueMap::new(),
            triggers: Vec::new(),
            config: RunbookConfig {
                automation_level: AutomationLevel::L2,
                max_execution_time: 60,
                requires_approval: false,
                rollback_on_failure: false,
            },
            steps: vec![RunbookStep {
                id: StepId::new("s1"),
                name: "s1".to_string(),
                action: ActionName::new("isolate_host"),
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
    async fn disabled_executor_refuses_to_run() {
        let runbook = write_step_runbook();
        let mut ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Simulation,
            None,
        );
        let executor = L2Executor::new(false);
        let adapters = AdapterRegistry::new();
        let controller = ExecutionController::new();
        let outcome = executor.run(&runbook, &mut ctx, &adapters, &controller, &test_audit()).await;
        assert!(outcome.halted);
        assert!(outcome.simulation.is_none());
    }

    #[tokio::test]
    async fn production_mode_is_rejected() {
        let runbook = write_step_runbook();
        let mut ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Production,
            None,
        );
        let executor = L2Executor::new(true);
        let adapters = AdapterRegistry::new();
        let controller = ExecutionController::new();
        let outcome = executor.run(&runbook, &mut ctx, &adapters, &controller, &test_audit()).await;
        assert!(outcome.halted);
    }

    #[tokio::test]
    async fn write_step_is_scored_not_dispatched() {
        let runbook = write_step_runbook();
        let mut ctx = ExecutionContext::new(
            ExecutionId::generate(),
            runbook.id.clone(),
            runbook.version.clone(),
            ExecutionMode::Simulation,
            None,
        );
        let executor = L2Executor::new(true);
        let adapters = AdapterRegistry::new();
        let controller = ExecutionController::new();
        let outcome = executor.run(&runbook, &mut ctx, &adapters, &controller, &test_audit()).await;
        assert!(!outcome.halted);
        let report = outcome.simulation.unwrap_or_else(|| unreachable!("enabled simulation run always produces a report"));
        assert_eq!(report.steps.len(), 1);
        assert!(report.steps[0].is_write_action);
        assert!(report.overall_risk_score >= 9);
    }
}
