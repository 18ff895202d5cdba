// runbookpilot-core/tests/scenarios.rs
// ============================================================================
// Module: Testable Property Scenarios
// Description: The eight literal input/output scenarios enumerated for the
//              engine, driven end to end through the orchestrator.
// ============================================================================
//! ## Overview
//! Each test below is one scenario: a runbook (and, where relevant, an
//! alert) constructed exactly as the scenario describes, run through
//! `Orchestrator::execute`, and asserted against the scenario's literal
//! expected outcome.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions are permitted."
)]

use std::sync::Arc;

use async_trait::async_trait;
use runbookpilot_core::Adapter;
use runbookpilot_core::AdapterResult;
use runbookpilot_core::ApprovalQueue;
use runbookpilot_core::ExecutionState;
use runbookpilot_core::InMemoryApprovalStore;
use runbookpilot_core::InMemoryAuditSink;
use runbookpilot_core::InMemoryRunStateStore;
use runbookpilot_core::Orchestrator;
use runbookpilot_core::OrchestratorCallbacks;
use runbookpilot_core::SimulationMetricsCollector;
use runbookpilot_core::core::ActionName;
use runbookpilot_core::core::Alert;
use runbookpilot_core::core::ApprovalRequest;
use runbookpilot_core::core::AutomationLevel;
use runbookpilot_core::core::ExecutionId;
use runbookpilot_core::core::ExecutionMode;
use runbookpilot_core::core::ExecutorName;
use runbookpilot_core::core::OnError;
use runbookpilot_core::core::OpaqueMap;
use runbookpilot_core::core::RollbackSpec;
use runbookpilot_core::core::Runbook;
use runbookpilot_core::core::RunbookConfig;
use runbookpilot_core::core::RunbookId;
use runbookpilot_core::core::RunbookStep;
use runbookpilot_core::core::StepId;
use runbookpilot_core::core::TriggerFilter;
use runbookpilot_core::evaluate_trigger;
use runbookpilot_core::runtime::audit_log::compute_hash;
use runbookpilot_core::runtime::scheduler::AdapterRegistry;
use runbookpilot_core::runtime::scheduler::topological_order;
use runbookpilot_core::runtime::tiers::AlwaysConfirm;
use runbookpilot_core::runtime::tiers::ApprovalCallback;
use serde_json::json;

// ============================================================================
// SECTION: Shared Fixtures
// ============================================================================

struct EchoAdapter;

#[async_trait]
impl Adapter for EchoAdapter {
    async fn execute(&self, action: &str, params: &serde_json::Value, _mode: ExecutionMode) -> AdapterResult {
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

fn step(id: &str, action: &str, depends_on: &[&str], on_error: OnError) -> RunbookStep {
    RunbookStep {
        id: StepId::new(id),
        name: id.to_string(),
        action: ActionName::new(action),
        executor: ExecutorName::new("echo"),
        parameters: OpaqueMap::new(),
        depends_on: depends_on.iter().map(|d| StepId::new(*d)).collect(),
        condition: None,
        on_error,
        timeout: 5,
        approval_required: None,
        rollback: None,
    }
}

fn runbook(level: AutomationLevel, steps: Vec<RunbookStep>, rollback_on_failure: bool) -> Runbook {
    Runbook {
        id: RunbookId::new("rb-scenario"),
        version: "1".to_string(),
        name: "scenario".to_string(),
        metadata: OpaqueMap::new(),
        triggers: Vec::new(),
        config: RunbookConfig {
            automation_level: level,
            max_execution_time: 60,
            requires_approval: false,
            rollback_on_failure,
        },
        steps,
    }
}

fn orchestrator(metrics: Arc<SimulationMetricsCollector>) -> Orchestrator {
    Orchestrator::new(
        Arc::new(AdapterRegistry::new()),
        Arc::new(ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new()))),
        Arc::new(InMemoryAuditSink::new()),
        Arc::new(InMemoryRunStateStore::new()),
        metrics,
        false,
    )
}

// ============================================================================
// SECTION: Scenario 1 — L1 read-only only
// ============================================================================

#[tokio::test]
async fn scenario_1_l1_read_only_never_asks_for_approval() {
    let asked = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    struct CountingApprove(Arc<std::sync::atomic::AtomicUsize>);
    #[async_trait]
    impl ApprovalCallback for CountingApprove {
        async fn decide(&self, _request: &ApprovalRequest) -> bool {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            true
        }
    }

    let orchestrator = orchestrator(Arc::new(SimulationMetricsCollector::new()));
    orchestrator.register_adapter("echo", Arc::new(EchoAdapter));

    let rb = runbook(
        AutomationLevel::L1,
        vec![step("query_siem", "query_siem", &[], OnError::Halt), step("enrich_ioc", "enrich_ioc", &[], OnError::Halt)],
        true,
    );
    let callbacks =
        OrchestratorCallbacks { confirm: Arc::new(AlwaysConfirm), approve: Arc::new(CountingApprove(Arc::clone(&asked))) };

    let result = orchestrator
        .execute(&rb, None, ExecutionMode::Production, &callbacks)
        .await
        .unwrap_or_else(|_| unreachable!("runbook validates"));

    assert_eq!(asked.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(result.steps.iter().all(|s| s.success));
    assert_eq!(result.context.state, ExecutionState::Completed);
}

// ============================================================================
// SECTION: Scenario 2 — L1 write denied with halt
// ============================================================================

#[tokio::test]
async fn scenario_2_l1_write_denied_with_halt_fails_without_rollback() {
    let orchestrator = orchestrator(Arc::new(SimulationMetricsCollector::new()));
    orchestrator.register_adapter("echo", Arc::new(EchoAdapter));

    let rb = runbook(AutomationLevel::L1, vec![step("block_ip", "block_ip", &[], OnError::Halt)], true);
    let callbacks = OrchestratorCallbacks { confirm: Arc::new(AlwaysConfirm), approve: Arc::new(AlwaysDeny) };

    let result = orchestrator
        .execute(&rb, None, ExecutionMode::Production, &callbacks)
        .await
        .unwrap_or_else(|_| unreachable!("runbook validates"));

    assert_eq!(result.steps.len(), 1);
    assert!(!result.success);
    assert_eq!(result.context.state, ExecutionState::Failed);
    assert_eq!(
        result.error.as_ref().and_then(|e| e.get("code")).and_then(serde_json::Value::as_str),
        Some("APPROVAL_DENIED")
    );
}

// ============================================================================
// SECTION: Scenario 3 — L1 rollback on a later failure
// ============================================================================

#[tokio::test]
async fn scenario_3_failure_after_a_successful_step_triggers_rollback() {
    struct DualAdapter;
    #[async_trait]
    impl Adapter for DualAdapter {
        async fn execute(&self, action: &str, params: &serde_json::Value, _mode: ExecutionMode) -> AdapterResult {
            if action == "block_ip" {
                AdapterResult {
                    success: false,
                    action: action.to_string(),
                    executor: "echo".to_string(),
                    duration_ms: 1,
                    output: None,
                    error: Some(runbookpilot_core::AdapterError {
                        code: "BLOCK_FAILED".to_string(),
                        message: "firewall rejected the rule".to_string(),
                        adapter: "echo".to_string(),
                        action: action.to_string(),
                        retryable: false,
                    }),
                }
            } else {
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
    }

    let metrics = Arc::new(SimulationMetricsCollector::new());
    let orchestrator = orchestrator(Arc::clone(&metrics));
    orchestrator.register_adapter("echo", Arc::new(DualAdapter));

    let mut collect = step("collect_logs", "collect_logs", &[], OnError::Halt);
    collect.rollback =
        Some(RollbackSpec { action: ActionName::new("collect_logs"), executor: None, parameters: OpaqueMap::new(), timeout: 5 });
    let block = step("block_ip", "block_ip", &["collect_logs"], OnError::Halt);

    let rb = runbook(AutomationLevel::L1, vec![collect, block], true);
    let callbacks = OrchestratorCallbacks { confirm: Arc::new(AlwaysConfirm), approve: Arc::new(AlwaysApprove) };

    let result = orchestrator
        .execute(&rb, None, ExecutionMode::Production, &callbacks)
        .await
        .unwrap_or_else(|_| unreachable!("runbook validates"));

    assert_eq!(metrics.snapshot().rollbacks_triggered, 1);
    assert!(matches!(result.context.state, ExecutionState::Completed | ExecutionState::Failed));
}

// ============================================================================
// SECTION: Scenario 4 — Topological order ignores declaration order
// ============================================================================

#[test]
fn scenario_4_topological_order_ignores_declaration_order() {
    let rb = runbook(
        AutomationLevel::L1,
        vec![
            step("C", "query_siem", &["A", "B"], OnError::Halt),
            step("A", "query_siem", &[], OnError::Halt),
            step("B", "query_siem", &["A"], OnError::Halt),
        ],
        false,
    );
    let order: Vec<String> = topological_order(&rb).into_iter().map(|id| id.to_string()).collect();
    assert_eq!(order, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
}

// ============================================================================
// SECTION: Scenario 5 — Numeric condition guard
// ============================================================================

#[tokio::test]
async fn scenario_5_numeric_condition_guard_runs_when_threshold_exceeded() {
    struct ScoredAdapter;
    #[async_trait]
    impl Adapter for ScoredAdapter {
        async fn execute(&self, action: &str, _params: &serde_json::Value, _mode: ExecutionMode) -> AdapterResult {
            AdapterResult {
                success: true,
                action: action.to_string(),
                executor: "echo".to_string(),
                duration_ms: 1,
                output: Some(json!({"risk_score": 85})),
                error: None,
            }
        }
    }

    let orchestrator = orchestrator(Arc::new(SimulationMetricsCollector::new()));
    orchestrator.register_adapter("echo", Arc::new(ScoredAdapter));

    let step_01 = step("step-01", "query_siem", &[], OnError::Halt);
    let mut step_02 = step("step-02", "block_ip", &["step-01"], OnError::Halt);
    step_02.condition = Some("{{ steps.step-01.output.risk_score }} > 50".to_string());

    let rb = runbook(AutomationLevel::L1, vec![step_01, step_02], false);
    let callbacks = OrchestratorCallbacks { confirm: Arc::new(AlwaysConfirm), approve: Arc::new(AlwaysApprove) };

    let result = orchestrator
        .execute(&rb, None, ExecutionMode::Production, &callbacks)
        .await
        .unwrap_or_else(|_| unreachable!("runbook validates"));

    let second = result.steps.iter().find(|s| s.step_id.as_str() == "step-02").expect("step-02 ran");
    assert_ne!(second.output.as_ref().and_then(|o| o.get("skipped")), Some(&json!(true)));
}

// ============================================================================
// SECTION: Scenario 6 — Approval expiry
// ============================================================================

#[tokio::test]
async fn scenario_6_expired_request_cannot_be_approved() {
    let queue = ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new()));
    let request = ApprovalRequest::new(
        ExecutionId::generate(),
        RunbookId::new("rb"),
        "rb".to_string(),
        StepId::new("s1"),
        "s1".to_string(),
        ActionName::new("block_ip"),
        json!({}),
        None,
        -1,
    );
    let request = queue.create(request).await.expect("create succeeds");

    let expired = queue.expire_stale().await.expect("expire_stale succeeds");
    assert!(expired >= 1);

    let outcome = queue.approve(&request.request_id, "analyst").await;
    assert!(outcome.is_err());
}

// ============================================================================
// SECTION: Scenario 7 — Audit chain on failure
// ============================================================================

#[tokio::test]
async fn scenario_7_audit_chain_recomputes_on_a_failed_execution() {
    struct AlwaysFailAdapter;
    #[async_trait]
    impl Adapter for AlwaysFailAdapter {
        async fn execute(&self, action: &str, _params: &serde_json::Value, _mode: ExecutionMode) -> AdapterResult {
            AdapterResult {
                success: false,
                action: action.to_string(),
                executor: "echo".to_string(),
                duration_ms: 1,
                output: None,
                error: Some(runbookpilot_core::AdapterError {
                    code: "FORCED_FAILURE".to_string(),
                    message: "forced".to_string(),
                    adapter: "echo".to_string(),
                    action: action.to_string(),
                    retryable: false,
                }),
            }
        }
    }

    let sink = Arc::new(InMemoryAuditSink::new());
    let orchestrator = Orchestrator::new(
        Arc::new(AdapterRegistry::new()),
        Arc::new(ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new()))),
        Arc::clone(&sink) as Arc<dyn runbookpilot_core::AuditSink>,
        Arc::new(InMemoryRunStateStore::new()),
        Arc::new(SimulationMetricsCollector::new()),
        false,
    );
    orchestrator.register_adapter("echo", Arc::new(AlwaysFailAdapter));

    let rb = runbook(AutomationLevel::L0, vec![step("s1", "query_siem", &[], OnError::Halt)], false);
    let callbacks = OrchestratorCallbacks::default();

    let result = orchestrator
        .execute(&rb, None, ExecutionMode::Production, &callbacks)
        .await
        .unwrap_or_else(|_| unreachable!("runbook validates"));

    assert!(!result.success);
    assert_eq!(result.context.state, ExecutionState::Failed);

    let chain = sink.chain_for(&result.context.execution_id).await.expect("in-memory sink never fails");
    assert!(chain.len() >= 4, "expected at least execution_started, step_started, step_failed, execution_failed");
    assert!(chain[0].prev_hash.is_none());
    assert_eq!(chain[0].event_type, runbookpilot_core::core::AuditEventType::ExecutionStarted);
    assert_eq!(chain.last().map(|entry| entry.event_type), Some(runbookpilot_core::core::AuditEventType::ExecutionFailed));

    let step_started = chain
        .iter()
        .position(|entry| entry.event_type == runbookpilot_core::core::AuditEventType::StepStarted)
        .expect("step_started recorded");
    let step_failed = chain
        .iter()
        .position(|entry| entry.event_type == runbookpilot_core::core::AuditEventType::StepFailed)
        .expect("step_failed recorded");
    assert!(step_started < step_failed, "step_started must precede step_failed");

    let mut prev: Option<String> = None;
    for entry in &chain {
        assert_eq!(entry.prev_hash, prev);
        let recomputed = compute_hash(prev.as_deref(), entry.event_type, &entry.execution_id, &entry.details, entry.created_at)
            .expect("details canonicalize");
        assert_eq!(recomputed, entry.hash);
        prev = Some(entry.hash.clone());
    }
}

// ============================================================================
// SECTION: Scenario 8 — Trigger parent match
// ============================================================================

#[test]
fn scenario_8_parent_mitre_technique_matches_a_child_subtechnique() {
    let filter = TriggerFilter {
        detection_sources: Vec::new(),
        mitre_techniques: vec!["T1059".to_string()],
        platforms: Vec::new(),
        severity: Vec::new(),
        expression: None,
    };
    let document = json!({
        "@timestamp": "2026-07-28T00:00:00Z",
        "event": {"kind": "alert"},
        "threat": {"technique": {"id": ["T1059.001"]}},
    });
    let Some(object) = document.as_object() else { unreachable!("json! object literal above") };
    let alert = Alert::new(object.clone());

    let evaluation = evaluate_trigger(&filter, &alert);
    assert!(evaluation.matched, "reason: {:?}", evaluation.reason);
}
