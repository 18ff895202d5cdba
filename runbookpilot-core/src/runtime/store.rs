// runbookpilot-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Stores
// Description: Memory-backed RunStateStore/ApprovalStore/AuditSink
//              implementations for tests and single-process deployments.
// Purpose: Let the engine run end-to-end with no external persistence
//          dependency; runbookpilot-store-sqlite supersedes these in a real
//          deployment.
// Dependencies: async-trait, crate::core, crate::interfaces, std::sync
// ============================================================================

//! ## Overview
//! Every store here is a `Mutex<BTreeMap<...>>` guarded synchronously; the
//! `async_trait` surface exists only so callers are insulated from swapping
//! in a real async backend later.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::ApprovalRequest;
use crate::core::ApprovalRequestId;
use crate::core::ApprovalStatus;
use crate::core::AuditEntry;
use crate::core::ExecutionContext;
use crate::core::ExecutionId;
use crate::core::Timestamp;
use crate::interfaces::ApprovalListFilter;
use crate::interfaces::ApprovalStore;
use crate::interfaces::AuditSink;
use crate::interfaces::RunStateStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Run State Store
// ============================================================================

/// Memory-backed [`RunStateStore`], keyed by execution id.
#[derive(Default)]
pub struct InMemoryRunStateStore {
    rows: Mutex<BTreeMap<ExecutionId, ExecutionContext>>,
}

impl InMemoryRunStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStateStore for InMemoryRunStateStore {
    async fn load(&self, execution_id: &ExecutionId) -> Result<Option<ExecutionContext>, StoreError> {
        #[allow(clippy::unwrap_used, reason = "poisoned store lock is unrecoverable process state")]
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(execution_id).cloned())
    }

    async fn save(&self, context: &ExecutionContext) -> Result<(), StoreError> {
        #[allow(clippy::unwrap_used, reason = "poisoned store lock is unrecoverable process state")]
        let mut rows = self.rows.lock().unwrap();
        rows.insert(context.execution_id.clone(), context.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Approval Store
// ============================================================================

/// Memory-backed [`ApprovalStore`], keyed by request id.
#[derive(Default)]
pub struct InMemoryApprovalStore {
    rows: Mutex<BTreeMap<ApprovalRequestId, ApprovalRequest>>,
}

impl InMemoryApprovalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn create(&self, request: &ApprovalRequest) -> Result<(), StoreError> {
        #[allow(clippy::unwrap_used, reason = "poisoned store lock is unrecoverable process state")]
        let mut rows = self.rows.lock().unwrap();
        rows.insert(request.request_id.clone(), request.clone());
        Ok(())
    }

    async fn get(&self, request_id: &ApprovalRequestId) -> Result<Option<ApprovalRequest>, StoreError> {
        #[allow(clippy::unwrap_used, reason = "poisoned store lock is unrecoverable process state")]
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(request_id).cloned())
    }

    async fn update(&self, request: &ApprovalRequest) -> Result<(), StoreError> {
        #[allow(clippy::unwrap_used, reason = "poisoned store lock is unrecoverable process state")]
        let mut rows = self.rows.lock().unwrap();
        rows.insert(request.request_id.clone(), request.clone());
        Ok(())
    }

    async fn expire_stale(&self, at: Timestamp) -> Result<u64, StoreError> {
        #[allow(clippy::unwrap_used, reason = "poisoned store lock is unrecoverable process state")]
        let mut rows = self.rows.lock().unwrap();
        let mut expired = 0u64;
        for request in rows.values_mut() {
            if request.is_stale(at) {
                request.status = ApprovalStatus::Expired;
                request.updated_at = at;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn list_pending(&self, filter: &ApprovalListFilter) -> Result<Vec<ApprovalRequest>, StoreError> {
        #[allow(clippy::unwrap_used, reason = "poisoned store lock is unrecoverable process state")]
        let rows = self.rows.lock().unwrap();
        let mut matching: Vec<ApprovalRequest> = rows
            .values()
            .filter(|request| request.status == ApprovalStatus::Pending)
            .filter(|request| filter.execution_id.as_ref().is_none_or(|id| id == &request.execution_id))
            .filter(|request| filter.runbook_id.as_ref().is_none_or(|id| id == &request.runbook_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));

        let offset = filter.offset as usize;
        let limit = if filter.limit == 0 { matching.len() } else { filter.limit as usize };
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

// ============================================================================
// SECTION: Audit Sink
// ============================================================================

/// Memory-backed [`AuditSink`], keyed by execution id, preserving append order.
#[derive(Default)]
pub struct InMemoryAuditSink {
    chains: Mutex<BTreeMap<ExecutionId, Vec<AuditEntry>>>,
}

impl InMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn last_hash(&self, execution_id: &ExecutionId) -> Result<Option<String>, StoreError> {
        #[allow(clippy::unwrap_used, reason = "poisoned store lock is unrecoverable process state")]
        let chains = self.chains.lock().unwrap();
        Ok(chains.get(execution_id).and_then(|chain| chain.last()).map(|entry| entry.hash.clone()))
    }

    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        #[allow(clippy::unwrap_used, reason = "poisoned store lock is unrecoverable process state")]
        let mut chains = self.chains.lock().unwrap();
        chains.entry(entry.execution_id.clone()).or_default().push(entry.clone());
        Ok(())
    }

    async fn chain_for(&self, execution_id: &ExecutionId) -> Result<Vec<AuditEntry>, StoreError> {
        #[allow(clippy::unwrap_used, reason = "poisoned store lock is unrecoverable process state")]
        let chains = self.chains.lock().unwrap();
        Ok(chains.get(execution_id).cloned().unwrap_or_default())
    }
}
