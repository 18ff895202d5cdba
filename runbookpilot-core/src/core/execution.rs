// runbookpilot-core/src/core/execution.rs
// ============================================================================
// Module: Execution Context And State
// Description: Per-run mutable state: lifecycle, variables, completed steps,
//              and per-step results.
// Purpose: Define ExecutionContext/ExecutionState/StepResult, owned
//          exclusively by one orchestrator run until terminal, then
//          serialised and released.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! `ExecutionContext` is the per-execution working set: it must round-trip
//! through JSON (snapshot/restore) since the orchestrator persists it between
//! suspension points. `ExecutionState` is a finite, constant transition
//! table owned by `runtime::state_machine`; this module defines only the
//! state set and its terminality, not the table.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::alert::Alert;
use super::identifiers::ActionName;
use super::identifiers::ExecutionId;
use super::identifiers::RunbookId;
use super::identifiers::StepId;
use super::runbook::OpaqueMap;
use super::runbook::OpaqueValue;
use super::time::Timestamp;

// ============================================================================
// SECTION: Execution State
// ============================================================================

/// Execution lifecycle state. The transition table living in
/// `runtime::state_machine` is the sole authority on which transitions are
/// legal; this enum only enumerates the possible values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Freshly created, nothing has happened yet.
    Idle,
    /// Runbook and alert are being validated.
    Validating,
    /// Validated; the scheduler is planning the walk order.
    Planning,
    /// Blocked on an L2 pre-execution confirmation.
    AwaitingApproval,
    /// The tier executor is walking steps.
    Executing,
    /// The rollback engine is compensating a failed execution.
    RollingBack,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
    /// Cancelled before reaching a natural terminal state.
    Cancelled,
}

impl ExecutionState {
    /// Whether this state is terminal (no further transitions are legal).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

// ============================================================================
// SECTION: Execution Mode
// ============================================================================

/// Mode an execution runs under; threaded through every adapter dispatch so
/// adapters can refuse to mutate state outside `production`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Normal execution; adapters may mutate external systems.
    Production,
    /// L2 simulation; adapters must not mutate external systems.
    Simulation,
    /// Dry run: resolve and validate without dispatching.
    DryRun,
}

// ============================================================================
// SECTION: Step Result
// ============================================================================

/// The outcome of dispatching (or skipping) one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step identifier.
    pub step_id: StepId,
    /// Step display name, copied for standalone readability.
    pub step_name: String,
    /// Action name that was (or would have been) dispatched.
    pub action: ActionName,
    /// Whether the step is considered successful. Skipped steps are successful.
    pub success: bool,
    /// When dispatch began.
    pub started_at: Timestamp,
    /// When dispatch concluded.
    pub completed_at: Timestamp,
    /// Wall-clock duration of the dispatch in milliseconds.
    pub duration_ms: i64,
    /// Adapter output, or a `{skipped: true, reason: ...}` marker.
    pub output: Option<OpaqueValue>,
    /// Structured error payload when `success` is false.
    pub error: Option<OpaqueValue>,
}

impl StepResult {
    /// Builds a skipped-step result with the given reason.
    #[must_use]
    pub fn skipped(step_id: StepId, step_name: String, action: ActionName, reason: &str) -> Self {
        let now = Timestamp::now();
        Self {
            step_id,
            step_name,
            action,
            success: true,
            started_at: now,
            completed_at: now,
            duration_ms: 0,
            output: Some(serde_json::json!({"skipped": true, "reason": reason})),
            error: None,
        }
    }
}

// ============================================================================
// SECTION: Execution Context
// ============================================================================

/// The mutable per-execution state threaded through one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Unique execution identifier.
    pub execution_id: ExecutionId,
    /// Runbook this execution is driving.
    pub runbook_id: RunbookId,
    /// Runbook version pinned at start.
    pub runbook_version: String,
    /// Execution mode.
    pub mode: ExecutionMode,
    /// When the execution began.
    pub started_at: Timestamp,
    /// Step currently dispatching, if any.
    pub current_step: Option<StepId>,
    /// Ids of steps that have produced a `StepResult` (success, failure, or skip).
    pub completed_steps: Vec<StepId>,
    /// Per-step outputs, keyed by step id, exposed to templating as `steps.<id>.output`.
    pub step_outputs: BTreeMap<String, OpaqueValue>,
    /// Free-form execution-scoped variables, exposed to templating as `context.*`.
    pub variables: OpaqueMap,
    /// Current lifecycle state.
    pub state: ExecutionState,
    /// Terminal error payload, set only when `state == Failed`.
    pub error: Option<OpaqueValue>,
    /// The alert this execution is responding to.
    pub alert: Option<Alert>,
}

impl ExecutionContext {
    /// Creates a fresh execution context in the `Idle` state.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        runbook_id: RunbookId,
        runbook_version: String,
        mode: ExecutionMode,
        alert: Option<Alert>,
    ) -> Self {
        Self {
            execution_id,
            runbook_id,
            runbook_version,
            mode,
            started_at: Timestamp::now(),
            current_step: None,
            completed_steps: Vec::new(),
            step_outputs: BTreeMap::new(),
            variables: OpaqueMap::new(),
            state: ExecutionState::Idle,
            error: None,
            alert,
        }
    }

    /// Records a step result: appends to `completed_steps` and, for steps with
    /// output, publishes it under `step_outputs` for downstream templating.
    pub fn record_step(&mut self, result: &StepResult) {
        self.completed_steps.push(result.step_id.clone());
        if let Some(output) = &result.output {
            self.step_outputs.insert(result.step_id.to_string(), output.clone());
        }
    }

    /// Whether every id in `ids` has already produced a result.
    #[must_use]
    pub fn all_completed(&self, ids: &[StepId]) -> bool {
        ids.iter().all(|id| self.completed_steps.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_exactly_the_three_named() {
        assert!(ExecutionState::Completed.is_terminal());
        assert!(ExecutionState::Failed.is_terminal());
        assert!(ExecutionState::Cancelled.is_terminal());
        assert!(!ExecutionState::Executing.is_terminal());
        assert!(!ExecutionState::Idle.is_terminal());
    }

    #[test]
    fn record_step_publishes_output_for_templating() {
        let mut ctx = ExecutionContext::new(
            ExecutionId::generate(),
            RunbookId::new("rb"),
            "1".to_string(),
            ExecutionMode::Production,
            None,
        );
        let result = StepResult {
            step_id: StepId::new("s1"),
            step_name: "s1".to_string(),
            action: ActionName::new("query_siem"),
            success: true,
            started_at: Timestamp::now(),
            completed_at: Timestamp::now(),
            duration_ms: 5,
            output: Some(serde_json::json!({"risk_score": 85})),
            error: None,
        };
        ctx.record_step(&result);
        assert!(ctx.all_completed(&[StepId::new("s1")]));
        assert_eq!(ctx.step_outputs.get("s1").and_then(|v| v.get("risk_score")).cloned(), Some(serde_json::json!(85)));
    }
}
