// runbookpilot-core/src/core/approval.rs
// ============================================================================
// Module: Approval Request
// Description: Persistent pending-decision record for L1 write steps.
// Purpose: Define ApprovalRequest and its status lifecycle; the queue
//          operations (create/approve/deny/expire/list) live in
//          runtime::approval_queue.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Lifecycle: `pending → (approved | denied | expired)`. Terminal states are
//! final — the queue never reopens a decided or expired request.

use serde::Deserialize;
use serde::Serialize;

use super::identifiers::ActionName;
use super::identifiers::ApprovalRequestId;
use super::identifiers::ExecutionId;
use super::identifiers::RunbookId;
use super::identifiers::StepId;
use super::runbook::OpaqueValue;
use super::time::Timestamp;

/// Status of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting an analyst decision, not yet expired.
    Pending,
    /// An analyst approved the request.
    Approved,
    /// An analyst denied the request.
    Denied,
    /// The TTL elapsed before a decision was made.
    Expired,
}

impl ApprovalStatus {
    /// Terminal statuses are final; only `Pending` accepts further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A pending (or decided) analyst approval for one write step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request identifier.
    pub request_id: ApprovalRequestId,
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// Owning runbook id, denormalized for query convenience.
    pub runbook_id: RunbookId,
    /// Owning runbook display name, denormalized for query convenience.
    pub runbook_name: String,
    /// Step requesting approval.
    pub step_id: StepId,
    /// Step display name, denormalized.
    pub step_name: String,
    /// Action the step would dispatch if approved.
    pub action: ActionName,
    /// Resolved parameters the step would dispatch with.
    pub parameters: OpaqueValue,
    /// L2 simulation result backing this request, when one was produced.
    pub simulation_result: Option<OpaqueValue>,
    /// Current status.
    pub status: ApprovalStatus,
    /// When the request was created.
    pub requested_at: Timestamp,
    /// When the request expires if left undecided.
    pub expires_at: Timestamp,
    /// Analyst identity that decided the request.
    pub approved_by: Option<String>,
    /// When the request was decided.
    pub approved_at: Option<Timestamp>,
    /// Reason given for a denial.
    pub denial_reason: Option<String>,
    /// Row creation timestamp.
    pub created_at: Timestamp,
    /// Row last-update timestamp.
    pub updated_at: Timestamp,
}

/// Errors raised while deciding an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    /// No request exists with the given id.
    #[error("approval request not found")]
    NotFound,
    /// The request was not `pending` when a decision was attempted.
    #[error("approval request is not pending")]
    NotPending,
    /// The request's TTL had already elapsed.
    #[error("approval request has expired")]
    Expired,
}

impl ApprovalRequest {
    /// Creates a fresh pending request with `expires_at = now + ttl_seconds`.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "mirrors the approval record's own field count")]
    pub fn new(
        execution_id: ExecutionId,
        runbook_id: RunbookId,
        runbook_name: String,
        step_id: StepId,
        step_name: String,
        action: ActionName,
        parameters: OpaqueValue,
        simulation_result: Option<OpaqueValue>,
        ttl_seconds: i64,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            request_id: ApprovalRequestId::generate(),
            execution_id,
            runbook_id,
            runbook_name,
            step_id,
            step_name,
            action,
            parameters,
            simulation_result,
            status: ApprovalStatus::Pending,
            requested_at: now,
            expires_at: now.plus_seconds(ttl_seconds),
            approved_by: None,
            approved_at: None,
            denial_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether, as of `at`, this request's TTL has elapsed while still pending.
    #[must_use]
    pub fn is_stale(&self, at: Timestamp) -> bool {
        self.status == ApprovalStatus::Pending && self.expires_at.is_before(at)
    }
}
