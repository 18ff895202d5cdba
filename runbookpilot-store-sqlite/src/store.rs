// runbookpilot-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store
// Description: One SQLite-backed connection implementing RunStateStore,
//              ApprovalStore, and AuditSink over the logical schema:
//              executions, step_results, approval_queue, audit_log,
//              schema_version.
// Purpose: Durable persistence for execution snapshots, approval lifecycle,
//          and the hash-chained audit log.
// Dependencies: runbookpilot-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A single `SqliteStore` wraps one `Mutex<Connection>` and implements all
//! three persistence traits the engine consumes. Foreign keys are enforced
//! (`step_results`, `approval_queue`, and `audit_log` all reference
//! `executions`), WAL journal mode is used for file-backed databases, and
//! every statement is prepared rather than string-formatted. The audit log's
//! single-writer-per-execution requirement falls out of the shared mutex: two
//! concurrent `append` calls for the same execution serialize through it, so
//! the hash chain can never fork.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use runbookpilot_core::ActionName;
use runbookpilot_core::ApprovalError;
use runbookpilot_core::ApprovalListFilter;
use runbookpilot_core::ApprovalRequest;
use runbookpilot_core::ApprovalRequestId;
use runbookpilot_core::ApprovalStatus;
use runbookpilot_core::ApprovalStore;
use runbookpilot_core::AuditEntry;
use runbookpilot_core::AuditEntryId;
use runbookpilot_core::AuditEventType;
use runbookpilot_core::AuditSink;
use runbookpilot_core::ExecutionContext;
use runbookpilot_core::ExecutionId;
use runbookpilot_core::RunStateStore;
use runbookpilot_core::RunbookId;
use runbookpilot_core::StepId;
use runbookpilot_core::StoreError;
use runbookpilot_core::Timestamp;
use serde::Deserialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version this build expects `schema_version` to contain.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout, matching the provider's retry budget.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode. In-memory stores may keep the engine's native mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended for file-backed stores).
    #[default]
    Wal,
    /// Delete journal mode (legacy, or the in-memory default).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` synchronous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest; the audit log's durability contract
    /// depends on this for file-backed stores).
    #[default]
    Full,
    /// Normal synchronous mode (faster, weaker durability guarantee).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite`-backed store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the database file, or `:memory:` for an in-process store.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode; ignored (and left at the engine default) for `:memory:`.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// Synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// An in-memory store suitable for tests and single-process demos.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::Delete,
            sync_mode: SqliteSyncMode::Full,
        }
    }

    /// Whether this config points at an in-memory database.
    fn is_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised opening or initializing the store.
#[derive(Debug, thiserror::Error)]
pub enum SqliteStoreError {
    /// The database file or its parent directory could not be prepared.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// The `SQLite` engine rejected a statement or pragma.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// The schema version on disk does not match what this build expects.
    #[error("sqlite store schema version mismatch: {0}")]
    VersionMismatch(String),
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Db(err.to_string())
    }
}

fn store_error(err: rusqlite::Error) -> StoreError {
    StoreError::Io(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of `RunStateStore`, `ApprovalStore`, and
/// `AuditSink`, sharing one connection across all three concerns.
#[derive(Clone)]
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if necessary) the store at `config.path` and applies
    /// the schema, running migrations idempotently.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] if the file cannot be opened, pragmas
    /// cannot be applied, or the schema is at an unsupported version.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if !config.is_memory() {
            ensure_parent_dir(&config.path)?;
        }
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        #[allow(clippy::unwrap_used, reason = "a poisoned store mutex is unrecoverable process state")]
        self.connection.lock().unwrap()
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        }
    }
    Ok(())
}

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = if config.is_memory() {
        Connection::open_in_memory().map_err(SqliteStoreError::from)?
    } else {
        Connection::open_with_flags(&config.path, flags).map_err(SqliteStoreError::from)?
    };
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    if !config.is_memory() {
        connection
            .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    }
    connection.execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    Ok(connection)
}

fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM schema_version LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO schema_version (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS executions (
                    execution_id TEXT PRIMARY KEY,
                    runbook_id TEXT NOT NULL,
                    runbook_version TEXT NOT NULL,
                    state TEXT NOT NULL,
                    mode TEXT NOT NULL,
                    started_at TEXT NOT NULL,
                    completed_at TEXT,
                    duration_ms INTEGER,
                    context_snapshot TEXT NOT NULL,
                    error TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS step_results (
                    execution_id TEXT NOT NULL,
                    step_id TEXT NOT NULL,
                    step_name TEXT NOT NULL,
                    action TEXT NOT NULL,
                    success INTEGER NOT NULL,
                    started_at TEXT NOT NULL,
                    completed_at TEXT NOT NULL,
                    duration_ms INTEGER NOT NULL,
                    output TEXT,
                    error TEXT,
                    PRIMARY KEY (execution_id, step_id),
                    FOREIGN KEY (execution_id) REFERENCES executions(execution_id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS approval_queue (
                    request_id TEXT PRIMARY KEY,
                    execution_id TEXT NOT NULL,
                    runbook_id TEXT NOT NULL,
                    runbook_name TEXT NOT NULL,
                    step_id TEXT NOT NULL,
                    step_name TEXT NOT NULL,
                    action TEXT NOT NULL,
                    parameters TEXT NOT NULL,
                    simulation_result TEXT,
                    status TEXT NOT NULL,
                    requested_at TEXT NOT NULL,
                    expires_at TEXT NOT NULL,
                    approved_by TEXT,
                    approved_at TEXT,
                    denial_reason TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY (execution_id) REFERENCES executions(execution_id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_approval_queue_pending
                    ON approval_queue (status, requested_at);
                CREATE TABLE IF NOT EXISTS audit_log (
                    id TEXT PRIMARY KEY,
                    seq INTEGER NOT NULL,
                    execution_id TEXT NOT NULL,
                    runbook_id TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    actor TEXT NOT NULL,
                    details TEXT NOT NULL,
                    prev_hash TEXT,
                    hash TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (execution_id) REFERENCES executions(execution_id) ON DELETE CASCADE
                );
                CREATE UNIQUE INDEX IF NOT EXISTS idx_audit_log_chain_order
                    ON audit_log (execution_id, seq);",
            )?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value} (expected {SCHEMA_VERSION})"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}

// ============================================================================
// SECTION: Timestamp Codec
// ============================================================================

fn timestamp_to_text(ts: Timestamp) -> Result<String, StoreError> {
    ts.to_rfc3339().map_err(|err| StoreError::Invalid(format!("unformattable timestamp: {err}")))
}

fn timestamp_from_text(text: &str) -> Result<Timestamp, StoreError> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|err| StoreError::Corrupt(format!("invalid stored timestamp {text:?}: {err}")))
}

fn opaque_to_text(value: &serde_json::Value) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|err| StoreError::Invalid(err.to_string()))
}

fn opaque_from_text(text: &str) -> Result<serde_json::Value, StoreError> {
    serde_json::from_str(text).map_err(|err| StoreError::Corrupt(err.to_string()))
}

fn opaque_from_text_opt(text: Option<String>) -> Result<Option<serde_json::Value>, StoreError> {
    text.as_deref().map(opaque_from_text).transpose()
}

fn enum_to_text<T: serde::Serialize>(value: T) -> Result<String, StoreError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(text)) => Ok(text),
        Ok(other) => Err(StoreError::Invalid(format!("expected string enum encoding, got {other}"))),
        Err(err) => Err(StoreError::Invalid(err.to_string())),
    }
}

// ============================================================================
// SECTION: RunStateStore
// ============================================================================

#[async_trait]
impl RunStateStore for SqliteStore {
    async fn load(&self, execution_id: &ExecutionId) -> Result<Option<ExecutionContext>, StoreError> {
        let connection = self.lock();
        let snapshot: Option<String> = connection
            .query_row(
                "SELECT context_snapshot FROM executions WHERE execution_id = ?1",
                params![execution_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_error)?;
        snapshot.map(|text| opaque_from_text(&text)).transpose()?.map(|value| {
            serde_json::from_value(value)
                .map_err(|err| StoreError::Corrupt(format!("execution snapshot corrupt: {err}")))
        }).transpose()
    }

    async fn save(&self, context: &ExecutionContext) -> Result<(), StoreError> {
        let snapshot = serde_json::to_value(context)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        let snapshot_text = opaque_to_text(&snapshot)?;
        let now = timestamp_to_text(Timestamp::now())?;
        let started_at = timestamp_to_text(context.started_at)?;
        let mode_text = enum_to_text(context.mode)?;
        let state_text = enum_to_text(context.state)?;
        let error_text = context
            .error
            .as_ref()
            .map(opaque_to_text)
            .transpose()?;
        let completed_at = if context.state.is_terminal() { Some(now.clone()) } else { None };
        let connection = self.lock();
        connection
            .execute(
                "INSERT INTO executions (
                    execution_id, runbook_id, runbook_version, state, mode, started_at,
                    completed_at, duration_ms, context_snapshot, error, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                 ON CONFLICT(execution_id) DO UPDATE SET
                    state = excluded.state,
                    completed_at = excluded.completed_at,
                    duration_ms = excluded.duration_ms,
                    context_snapshot = excluded.context_snapshot,
                    error = excluded.error,
                    updated_at = excluded.updated_at",
                params![
                    execution_id_str(context),
                    context.runbook_id.as_str(),
                    context.runbook_version,
                    state_text,
                    mode_text,
                    started_at,
                    completed_at,
                    completed_at.as_ref().map(|_| context.started_at.millis_until(Timestamp::now())),
                    snapshot_text,
                    error_text,
                    now,
                ],
            )
            .map_err(store_error)?;
        Ok(())
    }
}

fn execution_id_str(context: &ExecutionContext) -> &str {
    context.execution_id.as_str()
}

// ============================================================================
// SECTION: ApprovalStore
// ============================================================================

#[async_trait]
impl ApprovalStore for SqliteStore {
    async fn create(&self, request: &ApprovalRequest) -> Result<(), StoreError> {
        let parameters = opaque_to_text(&request.parameters)?;
        let simulation_result = request.simulation_result.as_ref().map(opaque_to_text).transpose()?;
        let status = status_to_text(request.status);
        let requested_at = timestamp_to_text(request.requested_at)?;
        let expires_at = timestamp_to_text(request.expires_at)?;
        let approved_at = request.approved_at.map(timestamp_to_text).transpose()?;
        let created_at = timestamp_to_text(request.created_at)?;
        let updated_at = timestamp_to_text(request.updated_at)?;
        let connection = self.lock();
        connection
            .execute(
                "INSERT INTO approval_queue (
                    request_id, execution_id, runbook_id, runbook_name, step_id, step_name,
                    action, parameters, simulation_result, status, requested_at, expires_at,
                    approved_by, approved_at, denial_reason, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    request.request_id.as_str(),
                    request.execution_id.as_str(),
                    request.runbook_id.as_str(),
                    request.runbook_name,
                    request.step_id.as_str(),
                    request.step_name,
                    request.action.as_str(),
                    parameters,
                    simulation_result,
                    status,
                    requested_at,
                    expires_at,
                    request.approved_by,
                    approved_at,
                    request.denial_reason,
                    created_at,
                    updated_at,
                ],
            )
            .map_err(store_error)?;
        Ok(())
    }

    async fn get(&self, request_id: &ApprovalRequestId) -> Result<Option<ApprovalRequest>, StoreError> {
        let connection = self.lock();
        let row = connection
            .query_row(
                "SELECT request_id, execution_id, runbook_id, runbook_name, step_id, step_name, \
                 action, parameters, simulation_result, status, requested_at, expires_at, \
                 approved_by, approved_at, denial_reason, created_at, updated_at \
                 FROM approval_queue WHERE request_id = ?1",
                params![request_id.as_str()],
                map_approval_row,
            )
            .optional()
            .map_err(store_error)?;
        row.transpose()
    }

    async fn update(&self, request: &ApprovalRequest) -> Result<(), StoreError> {
        let status = status_to_text(request.status);
        let approved_at = request.approved_at.map(timestamp_to_text).transpose()?;
        let updated_at = timestamp_to_text(request.updated_at)?;
        let connection = self.lock();
        let affected = connection
            .execute(
                "UPDATE approval_queue SET status = ?1, approved_by = ?2, approved_at = ?3, \
                 denial_reason = ?4, updated_at = ?5 WHERE request_id = ?6",
                params![
                    status,
                    request.approved_by,
                    approved_at,
                    request.denial_reason,
                    updated_at,
                    request.request_id.as_str(),
                ],
            )
            .map_err(store_error)?;
        if affected == 0 {
            return Err(StoreError::Invalid(ApprovalError::NotFound.to_string()));
        }
        Ok(())
    }

    async fn expire_stale(&self, at: Timestamp) -> Result<u64, StoreError> {
        let at_text = timestamp_to_text(at)?;
        let updated_at = at_text.clone();
        let connection = self.lock();
        let affected = connection
            .execute(
                "UPDATE approval_queue SET status = 'expired', updated_at = ?1 \
                 WHERE status = 'pending' AND expires_at < ?2",
                params![updated_at, at_text],
            )
            .map_err(store_error)?;
        Ok(u64::try_from(affected).unwrap_or(0))
    }

    async fn list_pending(&self, filter: &ApprovalListFilter) -> Result<Vec<ApprovalRequest>, StoreError> {
        let connection = self.lock();
        let limit: i64 = if filter.limit == 0 { -1 } else { i64::from(filter.limit) };
        let offset = i64::from(filter.offset);
        let mut statement = connection
            .prepare(
                "SELECT request_id, execution_id, runbook_id, runbook_name, step_id, step_name, \
                 action, parameters, simulation_result, status, requested_at, expires_at, \
                 approved_by, approved_at, denial_reason, created_at, updated_at \
                 FROM approval_queue \
                 WHERE status = 'pending' \
                 AND (?1 IS NULL OR execution_id = ?1) \
                 AND (?2 IS NULL OR runbook_id = ?2) \
                 ORDER BY requested_at DESC LIMIT ?3 OFFSET ?4",
            )
            .map_err(store_error)?;
        let rows = statement
            .query_map(
                params![
                    filter.execution_id.as_ref().map(ExecutionId::as_str),
                    filter.runbook_id.as_ref().map(RunbookId::as_str),
                    limit,
                    offset,
                ],
                map_approval_row,
            )
            .map_err(store_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_error)?.into_iter().collect()
    }
}

fn status_to_text(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Pending => "pending",
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::Denied => "denied",
        ApprovalStatus::Expired => "expired",
    }
}

fn status_from_text(text: &str) -> Result<ApprovalStatus, StoreError> {
    match text {
        "pending" => Ok(ApprovalStatus::Pending),
        "approved" => Ok(ApprovalStatus::Approved),
        "denied" => Ok(ApprovalStatus::Denied),
        "expired" => Ok(ApprovalStatus::Expired),
        other => Err(StoreError::Corrupt(format!("unknown approval status: {other}"))),
    }
}

#[allow(clippy::type_complexity, reason = "one row maps to one flat tuple before reassembly")]
fn map_approval_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<ApprovalRequest, StoreError>> {
    let request_id: String = row.get(0)?;
    let execution_id: String = row.get(1)?;
    let runbook_id: String = row.get(2)?;
    let runbook_name: String = row.get(3)?;
    let step_id: String = row.get(4)?;
    let step_name: String = row.get(5)?;
    let action: String = row.get(6)?;
    let parameters: String = row.get(7)?;
    let simulation_result: Option<String> = row.get(8)?;
    let status: String = row.get(9)?;
    let requested_at: String = row.get(10)?;
    let expires_at: String = row.get(11)?;
    let approved_by: Option<String> = row.get(12)?;
    let approved_at: Option<String> = row.get(13)?;
    let denial_reason: Option<String> = row.get(14)?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;

    Ok((|| -> Result<ApprovalRequest, StoreError> {
        Ok(ApprovalRequest {
            request_id: ApprovalRequestId::new(request_id),
            execution_id: ExecutionId::new(execution_id),
            runbook_id: RunbookId::new(runbook_id),
            runbook_name,
            step_id: StepId::new(step_id),
            step_name,
            action: ActionName::new(action),
            parameters: opaque_from_text(&parameters)?,
            simulation_result: opaque_from_text_opt(simulation_result)?,
            status: status_from_text(&status)?,
            requested_at: timestamp_from_text(&requested_at)?,
            expires_at: timestamp_from_text(&expires_at)?,
            approved_by,
            approved_at: approved_at.as_deref().map(timestamp_from_text).transpose()?,
            denial_reason,
            created_at: timestamp_from_text(&created_at)?,
            updated_at: timestamp_from_text(&updated_at)?,
        })
    })())
}

// ============================================================================
// SECTION: AuditSink
// ============================================================================

#[async_trait]
impl AuditSink for SqliteStore {
    async fn last_hash(&self, execution_id: &ExecutionId) -> Result<Option<String>, StoreError> {
        let connection = self.lock();
        connection
            .query_row(
                "SELECT hash FROM audit_log WHERE execution_id = ?1 ORDER BY seq DESC LIMIT 1",
                params![execution_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_error)
    }

    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        let details = opaque_to_text(&entry.details)?;
        let created_at = timestamp_to_text(entry.created_at)?;
        let event_type = event_type_to_text(entry.event_type);
        let connection = self.lock();
        let next_seq: i64 = connection
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM audit_log WHERE execution_id = ?1",
                params![entry.execution_id.as_str()],
                |row| row.get(0),
            )
            .map_err(store_error)?;
        connection
            .execute(
                "INSERT INTO audit_log (
                    id, seq, execution_id, runbook_id, event_type, actor, details, prev_hash,
                    hash, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    entry.id.as_str(),
                    next_seq,
                    entry.execution_id.as_str(),
                    entry.runbook_id.as_str(),
                    event_type,
                    entry.actor,
                    details,
                    entry.prev_hash,
                    entry.hash,
                    created_at,
                ],
            )
            .map_err(store_error)?;
        Ok(())
    }

    async fn chain_for(&self, execution_id: &ExecutionId) -> Result<Vec<AuditEntry>, StoreError> {
        let connection = self.lock();
        let mut statement = connection
            .prepare(
                "SELECT id, execution_id, runbook_id, event_type, actor, details, prev_hash, \
                 hash, created_at FROM audit_log WHERE execution_id = ?1 ORDER BY seq ASC",
            )
            .map_err(store_error)?;
        let rows = statement
            .query_map(params![execution_id.as_str()], map_audit_row)
            .map_err(store_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_error)?.into_iter().collect()
    }
}

fn event_type_to_text(event_type: AuditEventType) -> String {
    match serde_json::to_value(event_type) {
        Ok(serde_json::Value::String(text)) => text,
        _ => "unknown".to_string(),
    }
}

fn event_type_from_text(text: &str) -> Result<AuditEventType, StoreError> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|err| StoreError::Corrupt(format!("unknown audit event type {text:?}: {err}")))
}

fn map_audit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<AuditEntry, StoreError>> {
    let id: String = row.get(0)?;
    let execution_id: String = row.get(1)?;
    let runbook_id: String = row.get(2)?;
    let event_type: String = row.get(3)?;
    let actor: String = row.get(4)?;
    let details: String = row.get(5)?;
    let prev_hash: Option<String> = row.get(6)?;
    let hash: String = row.get(7)?;
    let created_at: String = row.get(8)?;

    Ok((|| -> Result<AuditEntry, StoreError> {
        Ok(AuditEntry {
            id: AuditEntryId::new(id),
            execution_id: ExecutionId::new(execution_id),
            runbook_id: RunbookId::new(runbook_id),
            event_type: event_type_from_text(&event_type)?,
            actor,
            details: opaque_from_text(&details)?,
            prev_hash,
            hash,
            created_at: timestamp_from_text(&created_at)?,
        })
    })())
}
