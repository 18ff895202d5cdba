// runbookpilot-core/src/runtime/audit_log.rs
// ============================================================================
// Module: Audit Log
// Description: Hash-chain computation and append operations over the
//              persistent AuditSink.
// Purpose: Give the orchestrator one `append(...)` call that both persists
//          and chains every audit row.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The chain hash is computed over a literal `|`-joined byte sequence, not a
//! canonical JSON encoding of the whole row: `prev_hash | event_type |
//! execution_id | canonical_json(details) | created_at`. Only `details` is
//! canonicalized before joining, so the formula is reproducible from the
//! four logical inputs alone regardless of how the rest of the row is later
//! serialized.

use std::sync::Arc;

use crate::core::AuditEntry;
use crate::core::AuditEntryId;
use crate::core::AuditEventType;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::ExecutionId;
use crate::core::HashError;
use crate::core::OpaqueValue;
use crate::core::RunbookId;
use crate::core::Timestamp;
use crate::core::canonical_json_bytes;
use crate::core::hash_bytes;
use crate::interfaces::AuditSink;
use crate::interfaces::StoreError;

/// Errors raised while appending an audit entry.
#[derive(Debug, thiserror::Error)]
pub enum AuditLogError {
    /// The underlying sink failed.
    #[error("audit sink error: {0}")]
    Store(#[from] StoreError),
    /// The entry's `details` payload could not be canonicalized.
    #[error("failed to hash audit entry: {0}")]
    Hash(#[from] HashError),
}

/// Computes one entry's chain hash.
///
/// # Errors
/// Returns [`HashError`] if `details` fails to canonicalize.
pub fn compute_hash(
    prev_hash: Option<&str>,
    event_type: AuditEventType,
    execution_id: &ExecutionId,
    details: &OpaqueValue,
    created_at: Timestamp,
) -> Result<String, HashError> {
    let details_bytes = canonical_json_bytes(details)?;
    let mut joined = Vec::new();
    joined.extend_from_slice(prev_hash.unwrap_or_default().as_bytes());
    joined.push(b'|');
    joined.extend_from_slice(format!("{event_type:?}").as_bytes());
    joined.push(b'|');
    joined.extend_from_slice(execution_id.as_str().as_bytes());
    joined.push(b'|');
    joined.extend_from_slice(&details_bytes);
    joined.push(b'|');
    joined.extend_from_slice(created_at.to_string().as_bytes());
    Ok(hash_bytes(DEFAULT_HASH_ALGORITHM, &joined).value)
}

/// Appends hash-chained rows to one [`AuditSink`].
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
}

impl AuditLog {
    /// Wraps a sink implementation.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Appends one event, fetching the prior hash, computing the next link,
    /// and persisting the resulting row.
    ///
    /// # Errors
    /// Returns [`AuditLogError::Store`] if the sink fails, or
    /// [`AuditLogError::Hash`] if `details` cannot be canonicalized.
    pub async fn append(
        &self,
        execution_id: &ExecutionId,
        runbook_id: &RunbookId,
        event_type: AuditEventType,
        actor: &str,
        details: OpaqueValue,
    ) -> Result<AuditEntry, AuditLogError> {
        let prev_hash = self.sink.last_hash(execution_id).await?;
        let created_at = Timestamp::now();
        let hash = compute_hash(prev_hash.as_deref(), event_type, execution_id, &details, created_at)?;
        let sequence = self.sink.chain_for(execution_id).await?.len() + 1;

        let entry = AuditEntry {
            id: AuditEntryId::new(format!("{execution_id}-{sequence:010}")),
            execution_id: execution_id.clone(),
            runbook_id: runbook_id.clone(),
            event_type,
            actor: actor.to_string(),
            details,
            prev_hash,
            hash,
            created_at,
        };
        self.sink.append(&entry).await?;
        Ok(entry)
    }
}
