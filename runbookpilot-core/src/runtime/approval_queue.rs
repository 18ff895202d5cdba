// runbookpilot-core/src/runtime/approval_queue.rs
// ============================================================================
// Module: Approval Queue
// Description: Create/approve/deny/expire/list operations over the
//              persistent ApprovalStore.
// Purpose: Give the L1 tier executor (and any operator-facing surface) one
//          place that enforces the approval lifecycle invariants.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Every decision operation first expires stale rows so a request that has
//! silently outlived its TTL is never approved or denied after the fact.

use std::sync::Arc;

use crate::core::ApprovalError;
use crate::core::ApprovalRequest;
use crate::core::ApprovalRequestId;
use crate::core::ApprovalStatus;
use crate::core::Timestamp;
use crate::interfaces::ApprovalListFilter;
use crate::interfaces::ApprovalStore;
use crate::interfaces::StoreError;

/// Errors raised by queue operations, layering store failures onto the
/// request-lifecycle errors already defined on [`ApprovalRequest`].
#[derive(Debug, thiserror::Error)]
pub enum ApprovalQueueError {
    /// The underlying store failed.
    #[error("approval store error: {0}")]
    Store(#[from] StoreError),
    /// The request lifecycle rejected the operation.
    #[error(transparent)]
    Lifecycle(#[from] ApprovalError),
}

/// Operations over one [`ApprovalStore`], enforcing the pending →
/// {approved, denied, expired} lifecycle.
pub struct ApprovalQueue {
    store: Arc<dyn ApprovalStore>,
}

impl ApprovalQueue {
    /// Wraps a store implementation.
    #[must_use]
    pub fn new(store: Arc<dyn ApprovalStore>) -> Self {
        Self { store }
    }

    /// Persists a freshly constructed, pending request.
    ///
    /// # Errors
    /// Returns [`ApprovalQueueError::Store`] if persistence fails.
    pub async fn create(&self, request: ApprovalRequest) -> Result<ApprovalRequest, ApprovalQueueError> {
        self.store.create(&request).await?;
        Ok(request)
    }

    /// Approves a pending request.
    ///
    /// # Errors
    /// Returns [`ApprovalQueueError::Lifecycle`] with [`ApprovalError::NotFound`],
    /// [`ApprovalError::NotPending`], or [`ApprovalError::Expired`] when the
    /// request cannot be approved, or [`ApprovalQueueError::Store`] if
    /// persistence fails.
    pub async fn approve(
        &self,
        request_id: &ApprovalRequestId,
        approved_by: &str,
    ) -> Result<ApprovalRequest, ApprovalQueueError> {
        let mut request = self.load_decidable(request_id).await?;
        request.status = ApprovalStatus::Approved;
        request.approved_by = Some(approved_by.to_string());
        request.approved_at = Some(Timestamp::now());
        request.updated_at = Timestamp::now();
        self.store.update(&request).await?;
        Ok(request)
    }

    /// Denies a pending request.
    ///
    /// # Errors
    /// Same conditions as [`Self::approve`].
    pub async fn deny(
        &self,
        request_id: &ApprovalRequestId,
        approved_by: &str,
        reason: &str,
    ) -> Result<ApprovalRequest, ApprovalQueueError> {
        let mut request = self.load_decidable(request_id).await?;
        request.status = ApprovalStatus::Denied;
        request.approved_by = Some(approved_by.to_string());
        request.approved_at = Some(Timestamp::now());
        request.denial_reason = Some(reason.to_string());
        request.updated_at = Timestamp::now();
        self.store.update(&request).await?;
        Ok(request)
    }

    /// Expires every stale pending row as of now.
    ///
    /// # Errors
    /// Returns [`ApprovalQueueError::Store`] if the store operation fails.
    pub async fn expire_stale(&self) -> Result<u64, ApprovalQueueError> {
        Ok(self.store.expire_stale(Timestamp::now()).await?)
    }

    /// Lists pending requests matching `filter`.
    ///
    /// # Errors
    /// Returns [`ApprovalQueueError::Store`] if the store operation fails.
    pub async fn list_pending(
        &self,
        filter: &ApprovalListFilter,
    ) -> Result<Vec<ApprovalRequest>, ApprovalQueueError> {
        Ok(self.store.list_pending(filter).await?)
    }

    /// Loads a request, expiring stale rows first, and confirms it is still
    /// decidable (pending and not past its TTL).
    async fn load_decidable(&self, request_id: &ApprovalRequestId) -> Result<ApprovalRequest, ApprovalQueueError> {
        self.store.expire_stale(Timestamp::now()).await?;
        let Some(request) = self.store.get(request_id).await? else {
            return Err(ApprovalQueueError::Lifecycle(ApprovalError::NotFound));
        };
        if request.is_stale(Timestamp::now()) {
            return Err(ApprovalQueueError::Lifecycle(ApprovalError::Expired));
        }
        if request.status != ApprovalStatus::Pending {
            return Err(ApprovalQueueError::Lifecycle(ApprovalError::NotPending));
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::ActionName;
    use crate::core::ExecutionId;
    use crate::core::RunbookId;
    use crate::core::StepId;
    use crate::runtime::store::InMemoryApprovalStore;

    use super::*;

    fn sample_request(ttl_seconds: i64) -> ApprovalRequest {
        ApprovalRequest::new(
            ExecutionId::generate(),
            RunbookId::new("rb"),
            "rb".to_string(),
            StepId::new("s1"),
            "s1".to_string(),
            ActionName::new("block_ip"),
            serde_json::json!({}),
            None,
            ttl_seconds,
        )
    }

    #[tokio::test]
    async fn approve_transitions_pending_to_approved() {
        let queue = ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new()));
        let request = queue.create(sample_request(60)).await.unwrap_or_else(|_| unreachable!("in-memory store never fails"));
        let decided = queue.approve(&request.request_id, "analyst@example.com").await;
        assert!(decided.is_ok());
    }

    #[tokio::test]
    async fn deciding_twice_fails_with_not_pending() {
        let queue = ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new()));
        let request = queue.create(sample_request(60)).await.unwrap_or_else(|_| unreachable!("in-memory store never fails"));
        queue.approve(&request.request_id, "analyst@example.com").await.ok();
        let second = queue.deny(&request.request_id, "analyst@example.com", "changed my mind").await;
        assert!(matches!(second, Err(ApprovalQueueError::Lifecycle(ApprovalError::NotPending))));
    }

    #[tokio::test]
    async fn expired_request_cannot_be_decided() {
        let queue = ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new()));
        let request = queue.create(sample_request(-1)).await.unwrap_or_else(|_| unreachable!("in-memory store never fails"));
        let decided = queue.approve(&request.request_id, "analyst@example.com").await;
        assert!(matches!(decided, Err(ApprovalQueueError::Lifecycle(ApprovalError::Expired))));
    }

    #[tokio::test]
    async fn unknown_request_id_reports_not_found() {
        let queue = ApprovalQueue::new(Arc::new(InMemoryApprovalStore::new()));
        let decided = queue.approve(&ApprovalRequestId::generate(), "x").await;
        assert!(matches!(decided, Err(ApprovalQueueError::Lifecycle(ApprovalError::NotFound))));
    }
}
