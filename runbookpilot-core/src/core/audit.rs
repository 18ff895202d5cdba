// runbookpilot-core/src/core/audit.rs
// ============================================================================
// Module: Audit Entry
// Description: One row of the hash-chained append-only audit log.
// Purpose: Define AuditEntry and the event-kind taxonomy; chain computation
//          and persistence live in runtime::audit_log.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! `prev_hash` is the previous entry's `hash` for the same execution, or
//! `None` for the first entry. `hash` is computed over a literal `|`-joined
//! byte sequence — see `runtime::audit_log::compute_hash` — not over a
//! canonical JSON encoding of the whole row, so the chain is reproducible
//! from the four inputs alone: `prev_hash`, `event_type`, `execution_id`,
//! canonical `details`, and `created_at`.

use serde::Deserialize;
use serde::Serialize;

use super::identifiers::AuditEntryId;
use super::identifiers::ExecutionId;
use super::identifiers::RunbookId;
use super::runbook::OpaqueValue;
use super::time::Timestamp;

/// The taxonomy of audit events the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// An execution began.
    ExecutionStarted,
    /// An execution reached a terminal success state.
    ExecutionCompleted,
    /// An execution reached a terminal failure state.
    ExecutionFailed,
    /// The state machine transitioned.
    StateChanged,
    /// A step began dispatching.
    StepStarted,
    /// A step completed successfully (or was skipped).
    StepCompleted,
    /// A step's dispatch failed.
    StepFailed,
    /// An approval request was created.
    ApprovalRequested,
    /// An approval request was approved.
    ApprovalGranted,
    /// An approval request was denied.
    ApprovalDenied,
    /// Rollback began.
    RollbackStarted,
    /// Rollback finished (possibly with per-step failures).
    RollbackCompleted,
    /// Rollback itself failed to produce a result.
    RollbackFailed,
    /// A simulation run began.
    SimulationStarted,
    /// One step's simulated prediction was recorded.
    StepSimulated,
    /// A simulation run finished.
    SimulationCompleted,
    /// A simulation run failed.
    SimulationFailed,
    /// An approval-queue row was created by the orchestrator.
    ApprovalQueueCreated,
    /// An approval-queue row's decision was executed against the runbook.
    ApprovalQueueExecuted,
}

/// One append-only audit log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic row identifier.
    pub id: AuditEntryId,
    /// Execution this entry belongs to.
    pub execution_id: ExecutionId,
    /// Runbook the execution was driving.
    pub runbook_id: RunbookId,
    /// Event kind.
    pub event_type: AuditEventType,
    /// Who or what produced the event (`"engine"`, an analyst identity, …).
    pub actor: String,
    /// Opaque event-specific payload.
    pub details: OpaqueValue,
    /// The previous entry's hash for this execution, or `None` for the first.
    pub prev_hash: Option<String>,
    /// This entry's hash, covering `prev_hash`, `event_type`, `execution_id`,
    /// canonical `details`, and `created_at`.
    pub hash: String,
    /// When the entry was written.
    pub created_at: Timestamp,
}
