// runbookpilot-core/src/runtime/confidence.rs
// ============================================================================
// Module: Confidence Scorer
// Description: Weighted per-step confidence, aggregated into one report
//              confidence for the L2 simulation tier.
// Purpose: Combine parameter validation, adapter health, rollback
//          availability, and upstream rule confidence into one [0,1] score.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Per-step confidence is a weighted average of four `[0,1]` signals. The
//! weights are fixed and documented here (see `DESIGN.md` for the rationale):
//!
//! | signal | weight |
//! |---|---|
//! | `parameter_validation` | 0.40 |
//! | `adapter_health` (when known) | 0.25 |
//! | `rollback_available` | 0.20 |
//! | `detectforge_confidence` (when known) | 0.15 |
//!
//! When a signal is unknown its weight is redistributed proportionally
//! across the remaining known signals, so a step with only
//! `parameter_validation` and `rollback_available` known still produces a
//! well-formed `[0,1]` score rather than silently treating the unknown
//! signals as zero.

/// Per-step inputs to the confidence scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInputs {
    /// Whether the step's resolved parameters passed validation.
    pub parameter_validation: bool,
    /// Whether the adapter reported itself healthy, if known.
    pub adapter_health: Option<bool>,
    /// Whether a rollback is available for this step.
    pub rollback_available: bool,
    /// Upstream detection-rule confidence label, if the alert carried one.
    pub detectforge_confidence: Option<DetectforgeConfidence>,
}

/// Upstream detection confidence label, mapped to a fixed numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectforgeConfidence {
    /// Maps to `0.50`.
    Low,
    /// Maps to `0.75`.
    Medium,
    /// Maps to `0.95`.
    High,
}

impl DetectforgeConfidence {
    const fn as_score(self) -> f64 {
        match self {
            Self::Low => 0.50,
            Self::Medium => 0.75,
            Self::High => 0.95,
        }
    }
}

const WEIGHT_PARAMETER_VALIDATION: f64 = 0.40;
const WEIGHT_ADAPTER_HEALTH: f64 = 0.25;
const WEIGHT_ROLLBACK_AVAILABLE: f64 = 0.20;
const WEIGHT_DETECTFORGE: f64 = 0.15;

/// Scores one step, redistributing the weight of any unknown signal
/// proportionally across the known signals.
#[must_use]
pub fn score_step(inputs: ConfidenceInputs) -> f64 {
    let mut weighted_sum = inputs.parameter_validation as u8 as f64 * WEIGHT_PARAMETER_VALIDATION;
    let mut total_weight = WEIGHT_PARAMETER_VALIDATION;

    weighted_sum += inputs.rollback_available as u8 as f64 * WEIGHT_ROLLBACK_AVAILABLE;
    total_weight += WEIGHT_ROLLBACK_AVAILABLE;

    if let Some(healthy) = inputs.adapter_health {
        weighted_sum += healthy as u8 as f64 * WEIGHT_ADAPTER_HEALTH;
        total_weight += WEIGHT_ADAPTER_HEALTH;
    }
    if let Some(confidence) = inputs.detectforge_confidence {
        weighted_sum += confidence.as_score() * WEIGHT_DETECTFORGE;
        total_weight += WEIGHT_DETECTFORGE;
    }

    (weighted_sum / total_weight).clamp(0.0, 1.0)
}

/// Aggregates per-step confidences into one report confidence: the mean,
/// clamped to `[0,1]` and rounded to two decimals.
#[must_use]
pub fn aggregate_report_confidence(per_step: &[f64]) -> f64 {
    if per_step.is_empty() {
        return 1.0;
    }
    let mean = per_step.iter().sum::<f64>() / per_step.len() as f64;
    (mean.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_known_inputs_match_the_documented_weights() {
        let score = score_step(ConfidenceInputs {
            parameter_validation: true,
            adapter_health: Some(true),
            rollback_available: true,
            detectforge_confidence: Some(DetectforgeConfidence::High),
        });
        let expected = WEIGHT_PARAMETER_VALIDATION
            + WEIGHT_ADAPTER_HEALTH
            + WEIGHT_ROLLBACK_AVAILABLE
            + WEIGHT_DETECTFORGE * 0.95;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn unknown_signals_redistribute_rather_than_zero_out() {
        let score = score_step(ConfidenceInputs {
            parameter_validation: true,
            adapter_health: None,
            rollback_available: true,
            detectforge_confidence: None,
        });
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn failed_validation_lowers_score_even_with_everything_else_true() {
        let passing = score_step(ConfidenceInputs {
            parameter_validation: true,
            adapter_health: Some(true),
            rollback_available: true,
            detectforge_confidence: Some(DetectforgeConfidence::High),
        });
        let failing = score_step(ConfidenceInputs {
            parameter_validation: false,
            adapter_health: Some(true),
            rollback_available: true,
            detectforge_confidence: Some(DetectforgeConfidence::High),
        });
        assert!(failing < passing);
    }

    #[test]
    fn aggregate_rounds_to_two_decimals() {
        assert!((aggregate_report_confidence(&[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]) - 0.33).abs() < 1e-9);
    }

    #[test]
    fn aggregate_of_no_steps_is_fully_confident() {
        assert!((aggregate_report_confidence(&[]) - 1.0).abs() < 1e-9);
    }
}
