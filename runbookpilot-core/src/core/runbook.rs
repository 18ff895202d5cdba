// runbookpilot-core/src/core/runbook.rs
// ============================================================================
// Module: Runbook Schema
// Description: Declarative step-graph schema loaded once per runbook.
// Purpose: Define the immutable Runbook/RunbookStep/RunbookConfig types the
//          scheduler and tier executors walk.
// Dependencies: serde, std::collections
// ============================================================================

//! ## Overview
//! A `Runbook` is immutable once loaded: the orchestrator never mutates it,
//! only the per-execution `ExecutionContext` it drives. `depends_on` must form
//! a DAG over step ids; the scheduler is responsible for enforcing that, not
//! this module (this module only carries the declared shape).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::identifiers::ActionName;
use super::identifiers::ExecutorName;
use super::identifiers::RunbookId;
use super::identifiers::StepId;

// ============================================================================
// SECTION: Automation Level
// ============================================================================

/// Automation tier a runbook runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AutomationLevel {
    /// Display-only: every step requires analyst confirmation.
    L0,
    /// Semi-automated: write actions require approval, reads auto-execute.
    L1,
    /// Simulation: no adapter call mutates external systems.
    L2,
}

// ============================================================================
// SECTION: On-Error Policy
// ============================================================================

/// What the scheduler does when a step's dispatch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Stop scheduling further steps; the execution ends in `failed`.
    Halt,
    /// Record the failure and continue scheduling dependents.
    Continue,
    /// Treat the step as skipped rather than failed, and continue.
    Skip,
}

impl OnError {
    /// Whether this policy permits the scheduler to proceed past a failure.
    #[must_use]
    pub const fn permits_continuation(self) -> bool {
        matches!(self, Self::Continue | Self::Skip)
    }
}

// ============================================================================
// SECTION: Opaque Parameter Values
// ============================================================================

/// Opaque, engine-agnostic value carried in step parameters, adapter outputs,
/// and audit details. A thin alias over `serde_json::Value` kept distinct so
/// call sites read as domain types rather than raw JSON.
pub type OpaqueValue = serde_json::Value;

/// A mapping of string keys to opaque values, used for parameters and output.
pub type OpaqueMap = BTreeMap<String, OpaqueValue>;

// ============================================================================
// SECTION: Rollback Spec
// ============================================================================

/// Compensating action declared by a step, run in reverse order on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackSpec {
    /// Action name to dispatch during rollback.
    pub action: ActionName,
    /// Executor to dispatch through; defaults to the owning step's executor.
    pub executor: Option<ExecutorName>,
    /// Parameters for the rollback dispatch (templated like step parameters).
    #[serde(default)]
    pub parameters: OpaqueMap,
    /// Timeout in seconds for the rollback dispatch.
    pub timeout: u64,
}

// ============================================================================
// SECTION: Runbook Step
// ============================================================================

/// One node in the runbook's step graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunbookStep {
    /// Identifier unique within the owning runbook.
    pub id: StepId,
    /// Human-readable name.
    pub name: String,
    /// Action name dispatched to the executor.
    pub action: ActionName,
    /// Executor (adapter) this step dispatches through.
    pub executor: ExecutorName,
    /// Parameters, resolved through templating before dispatch.
    #[serde(default)]
    pub parameters: OpaqueMap,
    /// Ids of steps that must complete (possibly as skipped) before this one runs.
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    /// Guard expression; templated, then evaluated as a condition string.
    pub condition: Option<String>,
    /// Policy applied when this step's dispatch fails.
    pub on_error: OnError,
    /// Per-step dispatch timeout in seconds.
    pub timeout: u64,
    /// Overrides the L1 default of "writes require approval" when set.
    pub approval_required: Option<bool>,
    /// Compensating action run during rollback.
    pub rollback: Option<RollbackSpec>,
}

// ============================================================================
// SECTION: Runbook Config
// ============================================================================

/// Execution-wide configuration carried by a runbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunbookConfig {
    /// Automation tier this runbook executes under.
    pub automation_level: AutomationLevel,
    /// Overall execution timeout in seconds, enforced by the execution controller.
    pub max_execution_time: u64,
    /// L2-only: gate simulation behind an explicit confirmation before execution.
    #[serde(default)]
    pub requires_approval: bool,
    /// Whether a failed execution triggers the rollback engine.
    #[serde(default = "default_true")]
    pub rollback_on_failure: bool,
}

const fn default_true() -> bool {
    true
}

// ============================================================================
// SECTION: Trigger Filter
// ============================================================================

/// Filter deciding which alerts route to this runbook; see [`super::trigger`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerFilter {
    /// Detection sources this runbook responds to (empty = unconstrained).
    #[serde(default)]
    pub detection_sources: Vec<String>,
    /// MITRE ATT&CK techniques this runbook responds to.
    #[serde(default)]
    pub mitre_techniques: Vec<String>,
    /// Platforms this runbook responds to.
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Severity labels this runbook responds to.
    #[serde(default)]
    pub severity: Vec<String>,
    /// Optional additional expression tree evaluated against the alert.
    pub expression: Option<super::trigger::TriggerExpr>,
}

// ============================================================================
// SECTION: Runbook
// ============================================================================

/// A loaded, immutable runbook definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runbook {
    /// Identifier.
    pub id: RunbookId,
    /// Semantic version string.
    pub version: String,
    /// Human-readable display name.
    pub name: String,
    /// Free-form metadata (owner, description, tags).
    #[serde(default)]
    pub metadata: OpaqueMap,
    /// Trigger filters deciding which alerts activate this runbook.
    #[serde(default)]
    pub triggers: Vec<TriggerFilter>,
    /// Execution-wide configuration.
    pub config: RunbookConfig,
    /// The step graph.
    pub steps: Vec<RunbookStep>,
}

/// Errors raised while validating a loaded runbook's structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunbookError {
    /// A runbook declared zero steps.
    #[error("runbook {0} has no steps")]
    NoSteps(String),
    /// Two steps share the same id.
    #[error("runbook {runbook} has duplicate step id {step}")]
    DuplicateStepId {
        /// Owning runbook id.
        runbook: String,
        /// The duplicated step id.
        step: String,
    },
    /// A step's `depends_on` references an id not present in the runbook.
    #[error("runbook {runbook} step {step} depends on unknown step {dependency}")]
    UnknownDependency {
        /// Owning runbook id.
        runbook: String,
        /// The step with the dangling dependency.
        step: String,
        /// The unresolved dependency id.
        dependency: String,
    },
    /// `depends_on` forms a cycle.
    #[error("runbook {runbook} has a dependency cycle involving step {step}")]
    DependencyCycle {
        /// Owning runbook id.
        runbook: String,
        /// A step id on the cycle.
        step: String,
    },
}

impl Runbook {
    /// Validates the structural invariants the scheduler relies on: non-empty
    /// steps, unique ids, resolvable dependencies, and an acyclic graph.
    ///
    /// # Errors
    /// Returns [`RunbookError`] describing the first violation found.
    pub fn validate(&self) -> Result<(), RunbookError> {
        if self.steps.is_empty() {
            return Err(RunbookError::NoSteps(self.id.to_string()));
        }

        let mut seen = std::collections::BTreeSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(RunbookError::DuplicateStepId {
                    runbook: self.id.to_string(),
                    step: step.id.to_string(),
                });
            }
        }

        for step in &self.steps {
            for dependency in &step.depends_on {
                if !seen.contains(dependency.as_str()) {
                    return Err(RunbookError::UnknownDependency {
                        runbook: self.id.to_string(),
                        step: step.id.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
            }
        }

        self.check_acyclic()
    }

    fn check_acyclic(&self) -> Result<(), RunbookError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let by_id: BTreeMap<&str, &RunbookStep> =
            self.steps.iter().map(|s| (s.id.as_str(), s)).collect();
        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();

        fn visit<'a>(
            id: &'a str,
            by_id: &BTreeMap<&'a str, &'a RunbookStep>,
            marks: &mut BTreeMap<&'a str, Mark>,
            runbook_id: &str,
        ) -> Result<(), RunbookError> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(RunbookError::DependencyCycle {
                        runbook: runbook_id.to_string(),
                        step: id.to_string(),
                    });
                }
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            if let Some(step) = by_id.get(id) {
                for dependency in &step.depends_on {
                    visit(dependency.as_str(), by_id, marks, runbook_id)?;
                }
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        for step in &self.steps {
            visit(step.id.as_str(), &by_id, &mut marks, self.id.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, depends_on: &[&str]) -> RunbookStep {
        RunbookStep {
            id: StepId::new(id),
            name: id.to_string(),
            action: ActionName::new("noop"),
            executor: ExecutorName::new("mock"),
            parameters: OpaqueMap::new(),
            depends_on: depends_on.iter().map(|d| StepId::new(*d)).collect(),
            condition: None,
            on_error: OnError::Halt,
            timeout: 30,
            approval_required: None,
            rollback: None,
        }
    }

    fn runbook(steps: Vec<RunbookStep>) -> Runbook {
        Runbook {
            id: RunbookId::new("rb-1"),
            version: "1".to_string(),
            name: "test".to_string(),
            metadata: OpaqueMap::new(),
            triggers: Vec::new(),
            config: RunbookConfig {
                automation_level: AutomationLevel::L1,
                max_execution_time: 300,
                requires_approval: false,
                rollback_on_failure: true,
            },
            steps,
        }
    }

    #[test]
    fn empty_steps_is_rejected() {
        let rb = runbook(Vec::new());
        assert!(matches!(rb.validate(), Err(RunbookError::NoSteps(_))));
    }

    #[test]
    fn duplicate_step_ids_are_rejected() {
        let rb = runbook(vec![step("a", &[]), step("a", &[])]);
        assert!(matches!(rb.validate(), Err(RunbookError::DuplicateStepId { .. })));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let rb = runbook(vec![step("a", &["missing"])]);
        assert!(matches!(rb.validate(), Err(RunbookError::UnknownDependency { .. })));
    }

    #[test]
    fn cycle_is_rejected() {
        let rb = runbook(vec![step("a", &["b"]), step("b", &["a"])]);
        assert!(matches!(rb.validate(), Err(RunbookError::DependencyCycle { .. })));
    }

    #[test]
    fn valid_dag_passes() {
        let rb = runbook(vec![step("a", &[]), step("b", &["a"]), step("c", &["a", "b"])]);
        assert!(rb.validate().is_ok());
    }
}
