// runbookpilot-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Persistence Backend
// Description: Durable RunStateStore/ApprovalStore/AuditSink implementations.
// Purpose: Give RunbookPilot a production-grade persistence layer covering
//          the executions, step_results, approval_queue, audit_log, and
//          schema_version tables.
// Dependencies: runbookpilot-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate is the concrete engine behind the persistence interfaces
//! `runbookpilot-core` only consumes as traits. Each table enforces foreign
//! keys, uses prepared statements, and — for file-backed databases — runs in
//! WAL journal mode. The audit log's single-writer-per-execution guarantee is
//! enforced by serializing every append through one mutex-guarded connection,
//! keeping a single writer per execution even under concurrent callers.

pub mod store;

pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
