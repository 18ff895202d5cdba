// runbookpilot-core/src/runtime/metrics.rs
// ============================================================================
// Module: Simulation Metrics
// Description: In-process counters over L2 simulation outcomes and the
//              rollback engine's activity.
// Purpose: Give an operator a cheap, no-dependency view of how often
//          simulations run, what they predict, and how often rollback fires.
// Dependencies: crate::core, std::sync
// ============================================================================

//! ## Overview
//! Metrics live only in process memory; nothing here is persisted. A process
//! restart resets every counter. This is the deliberately simplest possible
//! collector — a dedicated metrics backend is a natural next integration
//! point, not something this engine should assume.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::PredictedOutcome;

/// Point-in-time snapshot of recorded simulation metrics.
#[derive(Debug, Clone, Default)]
pub struct SimulationMetricsSnapshot {
    /// Total simulations recorded.
    pub simulations_recorded: u64,
    /// Count of each predicted outcome seen so far.
    pub outcomes: BTreeMap<String, u64>,
    /// Mean `overall_confidence` across every recorded simulation.
    pub mean_confidence: f64,
    /// Mean `overall_risk_score` across every recorded simulation.
    pub mean_risk_score: f64,
    /// Total rollback runs triggered by the orchestrator.
    pub rollbacks_triggered: u64,
}

#[derive(Default)]
struct Totals {
    simulations_recorded: u64,
    outcomes: BTreeMap<String, u64>,
    confidence_sum: f64,
    risk_score_sum: f64,
    rollbacks_triggered: u64,
}

/// In-memory collector of L2 simulation outcomes and rollback activity.
#[derive(Default)]
pub struct SimulationMetricsCollector {
    totals: Mutex<Totals>,
}

impl SimulationMetricsCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed simulation.
    pub fn record_simulation(&self, outcome: PredictedOutcome, overall_confidence: f64, overall_risk_score: u8) {
        #[allow(clippy::unwrap_used, reason = "poisoned metrics lock is unrecoverable process state")]
        let mut totals = self.totals.lock().unwrap();
        totals.simulations_recorded += 1;
        *totals.outcomes.entry(format!("{outcome:?}")).or_insert(0) += 1;
        totals.confidence_sum += overall_confidence;
        totals.risk_score_sum += f64::from(overall_risk_score);
    }

    /// Records one rollback run having been triggered.
    pub fn record_rollback_triggered(&self) {
        #[allow(clippy::unwrap_used, reason = "poisoned metrics lock is unrecoverable process state")]
        let mut totals = self.totals.lock().unwrap();
        totals.rollbacks_triggered += 1;
    }

    /// Returns a snapshot of every counter recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> SimulationMetricsSnapshot {
        #[allow(clippy::unwrap_used, reason = "poisoned metrics lock is unrecoverable process state")]
        let totals = self.totals.lock().unwrap();
        let count = totals.simulations_recorded;
        SimulationMetricsSnapshot {
            simulations_recorded: count,
            outcomes: totals.outcomes.clone(),
            mean_confidence: if count == 0 { 0.0 } else { totals.confidence_sum / count as f64 },
            mean_risk_score: if count == 0 { 0.0 } else { totals.risk_score_sum / count as f64 },
            rollbacks_triggered: totals.rollbacks_triggered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_confidence_averages_recorded_simulations() {
        let metrics = SimulationMetricsCollector::new();
        metrics.record_simulation(PredictedOutcome::Success, 1.0, 2);
        metrics.record_simulation(PredictedOutcome::Partial, 0.5, 6);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.simulations_recorded, 2);
        assert!((snapshot.mean_confidence - 0.75).abs() < 1e-9);
        assert!((snapshot.mean_risk_score - 4.0).abs() < 1e-9);
    }

    #[test]
    fn outcomes_are_tallied_by_kind() {
        let metrics = SimulationMetricsCollector::new();
        metrics.record_simulation(PredictedOutcome::Success, 1.0, 1);
        metrics.record_simulation(PredictedOutcome::Success, 1.0, 1);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.outcomes.get("Success"), Some(&2));
    }

    #[test]
    fn rollback_trigger_count_is_independent_of_simulations() {
        let metrics = SimulationMetricsCollector::new();
        metrics.record_rollback_triggered();
        metrics.record_rollback_triggered();
        assert_eq!(metrics.snapshot().rollbacks_triggered, 2);
    }

    #[test]
    fn empty_collector_reports_zeroed_means() {
        let metrics = SimulationMetricsCollector::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.mean_confidence, 0.0);
        assert_eq!(snapshot.mean_risk_score, 0.0);
    }
}
