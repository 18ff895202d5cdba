// runbookpilot-core/src/runtime/tiers/mod.rs
// ============================================================================
// Module: Tier Executors
// Description: The three automation-tier walks (L0 display-only, L1
//              semi-automated, L2 simulation) sharing one scheduler.
// Purpose: Define the common TierExecutor trait and the callback interfaces
//          the orchestrator plugs an analyst-facing UI into.
// Dependencies: async_trait, crate::core, crate::runtime::{controller,
//               scheduler}
// ============================================================================

//! ## Overview
//! Each tier differs only in how (or whether) it gates a write step before
//! dispatch: L0 confirms every step, L1 confirms write steps only (reads
//! auto-execute), L2 never dispatches for real — it scores every write step
//! instead. All three share [`crate::runtime::scheduler::execute_step`] for
//! the read path and the rollback-availability bookkeeping.

mod l0;
mod l1;
mod l2;

pub use l0::L0Executor;
pub use l1::L1Executor;
pub use l2::L2Executor;

use async_trait::async_trait;

use crate::core::ExecutionContext;
use crate::core::Runbook;
use crate::core::SimulationReport;
use crate::core::StepResult;
use crate::runtime::audit_log::AuditLog;
use crate::runtime::controller::ExecutionController;
use crate::runtime::scheduler::AdapterRegistry;

/// Outcome of one tier executor's full walk over a runbook's steps.
pub struct TierRunOutcome {
    /// Every step result produced, in dispatch order.
    pub steps: Vec<StepResult>,
    /// Whether the walk stopped early (a halting failure, a denied approval,
    /// or an externally requested abort).
    pub halted: bool,
    /// Structured `{code, message}` payload explaining why the walk halted
    /// before a normal `StepResult` failure would have, e.g. a denied
    /// approval or a disabled L2 tier. `None` when the walk ran to
    /// completion or halted on an ordinary step failure already captured in
    /// `steps`.
    pub error: Option<serde_json::Value>,
    /// Populated only by the L2 tier.
    pub simulation: Option<SimulationReport>,
}

/// Walks a validated runbook's steps under one automation tier.
#[async_trait]
pub trait TierExecutor: Send + Sync {
    /// Runs the full step walk, mutating `ctx` as steps complete. Emits a
    /// `step_started`/`step_completed`/`step_failed` trio to `audit` for
    /// every step actually dispatched (condition- and dependency-skips carry
    /// no dispatch and so emit nothing).
    async fn run(
        &self,
        runbook: &Runbook,
        ctx: &mut ExecutionContext,
        adapters: &AdapterRegistry,
        controller: &ExecutionController,
        audit: &AuditLog,
    ) -> TierRunOutcome;
}

/// Analyst-facing gate asked before L0 dispatches any step, or before L1
/// dispatches a write step without an approval-queue round trip.
#[async_trait]
pub trait ConfirmationCallback: Send + Sync {
    /// Returns whether the analyst confirmed dispatch of `action` with the
    /// given resolved parameters.
    async fn confirm(&self, action: &str, resolved_parameters: &serde_json::Value) -> bool;
}

/// Analyst decision function consulted once an [`crate::core::ApprovalRequest`]
/// has been queued for a write step.
#[async_trait]
pub trait ApprovalCallback: Send + Sync {
    /// Returns whether the request should be approved.
    async fn decide(&self, request: &crate::core::ApprovalRequest) -> bool;
}

/// A [`ConfirmationCallback`] that always confirms, used where no analyst UI
/// is wired in (tests, headless dry runs).
pub struct AlwaysConfirm;

#[async_trait]
impl ConfirmationCallback for AlwaysConfirm {
    async fn confirm(&self, _action: &str, _resolved_parameters: &serde_json::Value) -> bool {
        true
    }
}

/// An [`ApprovalCallback`] that always approves, used where no analyst UI is
/// wired in.
pub struct AlwaysApprove;

#[async_trait]
impl ApprovalCallback for AlwaysApprove {
    async fn decide(&self, _request: &crate::core::ApprovalRequest) -> bool {
        true
    }
}
