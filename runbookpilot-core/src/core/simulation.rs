// runbookpilot-core/src/core/simulation.rs
// ============================================================================
// Module: Simulation Report
// Description: L2 tier output: predicted outcomes, impact, and confidence for
//              a runbook run that never mutates external systems.
// Purpose: Define SimulationReport/SimulatedStep and the small enums they
//          compose; aggregation logic lives in runtime::tiers::l2 and the
//          impact/confidence scorers.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A `SimulationReport` is produced once per L2 run. Every write step is
//! scored by the impact assessor and confidence scorer (`runtime::impact`,
//! `runtime::confidence`); read steps execute for real (simulation mode only
//! forbids mutation, not querying) and are not scored.

use serde::Deserialize;
use serde::Serialize;

use super::identifiers::ExecutionId;
use super::identifiers::RunbookId;
use super::identifiers::SimulationId;
use super::identifiers::StepId;
use super::runbook::OpaqueValue;
use super::time::Timestamp;

/// Risk bucket derived from a numeric risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Score in `[1,3]`.
    Low,
    /// Score in `[4,6]`.
    Medium,
    /// Score in `[7,8]`.
    High,
    /// Score in `[9,10]`.
    Critical,
}

impl RiskLevel {
    /// Buckets a risk score in `[1,10]` into its level.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            0 ..= 3 => Self::Low,
            4 ..= 6 => Self::Medium,
            7 ..= 8 => Self::High,
            _ => Self::Critical,
        }
    }
}

/// Overall outcome the simulation predicts for the runbook as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictedOutcome {
    /// Every non-skipped step's validations passed.
    Success,
    /// Some write steps failed, but not all of them.
    Partial,
    /// Some non-skipped step failed and every write step failed.
    Failure,
}

/// The impact assessment attached to one simulated write step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepImpact {
    /// Deterministic risk score in `[1,10]`.
    pub risk_score: u8,
    /// Risk bucket derived from `risk_score`.
    pub risk_level: RiskLevel,
    /// Whether the action has a known reverse pairing or a declared `rollback`.
    pub rollback_available: bool,
    /// Blast-radius counters keyed by asset kind (`host`, `user`, `service`, …).
    pub blast_radius: std::collections::BTreeMap<String, u64>,
    /// Fixed per-action summary sentence plus risk label and counts.
    pub summary: String,
}

/// One step's simulated prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedStep {
    /// Step identifier.
    pub step_id: StepId,
    /// Step display name.
    pub step_name: String,
    /// Predicted adapter output (real for reads, predicted for writes).
    pub predicted_result: Option<OpaqueValue>,
    /// Confidence in `[0,1]` that the predicted result will hold in production.
    pub confidence: f64,
    /// Predicted side effects, human-readable.
    pub side_effects: Vec<String>,
    /// Rollback action name, copied from the step's `rollback` clause if any.
    pub rollback_action: Option<String>,
    /// Rollback parameters, copied from the step's `rollback` clause if any.
    pub rollback_parameters: Option<OpaqueValue>,
    /// Whether the step's parameter validations passed.
    pub validations_passed: bool,
    /// Validation failure messages, empty when `validations_passed`.
    pub validation_errors: Vec<String>,
    /// Whether the action classifier marked this a write action.
    pub is_write_action: bool,
    /// Predicted dispatch duration in milliseconds.
    pub duration_ms: i64,
    /// Impact assessment; present for write actions only.
    pub impact: Option<StepImpact>,
}

/// One entry in the rollback plan walked in reverse execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackPlanEntry {
    /// Step the rollback compensates for.
    pub step_id: StepId,
    /// Rollback action name.
    pub action: String,
    /// Rollback parameters.
    pub parameters: OpaqueValue,
}

/// The L2 tier's aggregated output for one runbook execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Unique simulation identifier.
    pub simulation_id: SimulationId,
    /// Execution this simulation ran under.
    pub execution_id: ExecutionId,
    /// Runbook id.
    pub runbook_id: RunbookId,
    /// Runbook display name.
    pub runbook_name: String,
    /// When the report was produced.
    pub timestamp: Timestamp,
    /// Per-step predictions.
    pub steps: Vec<SimulatedStep>,
    /// Overall predicted outcome.
    pub predicted_outcome: PredictedOutcome,
    /// Mean per-step confidence, clamped to `[0,1]` and rounded to two decimals.
    pub overall_confidence: f64,
    /// `max` risk score over assessed write steps, or `1` if there were none.
    pub overall_risk_score: u8,
    /// Risk bucket derived from `overall_risk_score`.
    pub overall_risk_level: RiskLevel,
    /// `Σ step.timeout * 1000` across all steps.
    pub estimated_duration_ms: i64,
    /// Summaries of high/critical impacts.
    pub risks_identified: Vec<String>,
    /// Set-union of impact blast-radius asset lists across write steps.
    pub affected_assets: Vec<String>,
    /// Rollback plan assembled from steps carrying a `rollback` clause.
    pub rollback_plan: Vec<RollbackPlanEntry>,
    /// Upstream detection confidence label, when the alert carried one.
    pub detectforge_confidence: Option<String>,
    /// Upstream detection rule id, when the alert carried one.
    pub detectforge_rule_id: Option<String>,
}
