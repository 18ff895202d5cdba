// runbookpilot-core/src/interfaces/mod.rs
// ============================================================================
// Module: Runtime Interfaces
// Description: Trait boundaries between the engine and its external
//              collaborators (adapters, persistence, enrichment sources).
// Purpose: Keep the orchestrator generic over backend-specific concerns so
//          tests can swap in-memory implementations for real ones.
// Dependencies: async-trait, serde_json, std::error::Error
// ============================================================================

//! ## Overview
//! Everything the core engine consumes from the outside world — adapters,
//! persistence, enrichment sources — is expressed as a trait here. Concrete
//! implementations live in `runbookpilot-providers` (adapters, clock,
//! enrichment sources) and `runbookpilot-store-sqlite` (persistence); the
//! engine itself only ever depends on these interfaces.

use async_trait::async_trait;

use crate::core::ApprovalRequest;
use crate::core::ApprovalRequestId;
use crate::core::AuditEntry;
use crate::core::ExecutionContext;
use crate::core::ExecutionId;
use crate::core::ExecutionMode;
use crate::core::OpaqueValue;
use crate::core::RunbookId;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Structured error returned by an adapter dispatch.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AdapterError {
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Name of the adapter that produced the error.
    pub adapter: String,
    /// Action name that was being dispatched.
    pub action: String,
    /// Whether a retry (outside engine scope; on_error policy only) might succeed.
    pub retryable: bool,
}

/// The result of one adapter dispatch.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AdapterResult {
    /// Whether the dispatch succeeded.
    pub success: bool,
    /// Action name dispatched.
    pub action: String,
    /// Executor name that handled the dispatch.
    pub executor: String,
    /// Wall-clock duration of the dispatch in milliseconds.
    pub duration_ms: i64,
    /// Adapter output on success.
    pub output: Option<OpaqueValue>,
    /// Structured error on failure.
    pub error: Option<AdapterError>,
}

/// External pluggable handler that performs a named action.
///
/// Implementations must honour `mode == Simulation` by not mutating external
/// systems; the engine never inspects *how* an adapter keeps that promise.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Dispatches one action with resolved parameters under the given mode.
    async fn execute(
        &self,
        action: &str,
        params: &OpaqueValue,
        mode: ExecutionMode,
    ) -> AdapterResult;
}

// ============================================================================
// SECTION: Run State Store
// ============================================================================

/// Errors raised by the execution/approval/audit persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O-level failure occurred (file, connection, or transport).
    #[error("store io error: {0}")]
    Io(String),
    /// Stored data failed to deserialize into the expected shape.
    #[error("store holds corrupt data: {0}")]
    Corrupt(String),
    /// The store's schema version does not match what this build expects.
    #[error("store schema version mismatch: {0}")]
    VersionMismatch(String),
    /// The caller supplied an invalid argument (e.g. unknown execution id).
    #[error("invalid store request: {0}")]
    Invalid(String),
}

/// Persists and reloads `ExecutionContext` snapshots.
#[async_trait]
pub trait RunStateStore: Send + Sync {
    /// Loads the most recently saved context for `execution_id`, if any.
    async fn load(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<ExecutionContext>, StoreError>;

    /// Persists a full snapshot of `context`, replacing any prior snapshot.
    async fn save(&self, context: &ExecutionContext) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Approval Store
// ============================================================================

/// Optional filter for listing pending approval requests.
#[derive(Debug, Clone, Default)]
pub struct ApprovalListFilter {
    /// Restrict to one execution.
    pub execution_id: Option<ExecutionId>,
    /// Restrict to one runbook.
    pub runbook_id: Option<RunbookId>,
    /// Maximum rows to return.
    pub limit: u32,
    /// Rows to skip before `limit` is applied.
    pub offset: u32,
}

/// Persists approval queue rows and their lifecycle transitions.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Inserts a new pending request.
    async fn create(&self, request: &ApprovalRequest) -> Result<(), StoreError>;

    /// Loads one request by id.
    async fn get(
        &self,
        request_id: &ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Overwrites a request's mutable fields (status, decision metadata).
    async fn update(&self, request: &ApprovalRequest) -> Result<(), StoreError>;

    /// Marks every stale pending row (`status=pending AND expires_at < at`) as
    /// expired, returning the number of rows affected.
    async fn expire_stale(&self, at: Timestamp) -> Result<u64, StoreError>;

    /// Lists pending requests matching `filter`, ordered `requested_at DESC`.
    async fn list_pending(
        &self,
        filter: &ApprovalListFilter,
    ) -> Result<Vec<ApprovalRequest>, StoreError>;
}

// ============================================================================
// SECTION: Audit Sink
// ============================================================================

/// Appends rows to the hash-chained audit log and answers chain queries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Returns the most recently appended entry's hash for `execution_id`, if any.
    async fn last_hash(&self, execution_id: &ExecutionId) -> Result<Option<String>, StoreError>;

    /// Appends one entry. Implementations must serialize concurrent writers
    /// per-execution so the hash chain is never forked.
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError>;

    /// Returns every entry for `execution_id` in append order.
    async fn chain_for(&self, execution_id: &ExecutionId) -> Result<Vec<AuditEntry>, StoreError>;
}

// ============================================================================
// SECTION: Enrichment Source
// ============================================================================

/// Errors raised by an enrichment source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnrichmentError {
    /// The source's own `timeout_ms` elapsed before it returned.
    #[error("enrichment source timed out")]
    Timeout,
    /// The source failed to produce a result.
    #[error("enrichment source failed: {0}")]
    Failed(String),
}

/// A pre-execution context-augmentation source (threat intel, asset inventory, …).
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    /// Stable name the source is registered and replaced under.
    fn name(&self) -> &str;

    /// This source's own timeout budget in milliseconds.
    fn timeout_ms(&self) -> u64;

    /// Produces enrichment data for `alert`.
    async fn enrich(&self, alert: &OpaqueValue) -> Result<OpaqueValue, EnrichmentError>;
}
