#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions are permitted."
    )
)]
// runbookpilot-cli/src/main.rs
// ============================================================================
// Module: RunbookPilot CLI Entry Point
// Description: Command dispatcher driving one runbook execution, and
//              approval-queue / audit-log inspection subcommands.
// Purpose: Give an operator a way to exercise the engine end to end without
//          a SIEM/EDR/ticketing deployment.
// Dependencies: clap, runbookpilot-config, runbookpilot-core,
//               runbookpilot-providers, runbookpilot-store-sqlite, serde_json,
//               thiserror, tokio.
// ============================================================================

//! ## Overview
//! `runbookpilot run` loads a runbook YAML file and an optional alert JSON
//! file, registers a [`runbookpilot_providers::NoopAdapter`] for every
//! executor the runbook names, and drives one execution to a terminal state.
//! `runbookpilot approvals` and `runbookpilot audit` inspect the persisted
//! approval queue and hash-chained audit log of a prior run. All three share
//! one `--store` flag: omit it for an ephemeral in-memory store, or point it
//! at a file for a durable `SQLite`-backed one.

use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use runbookpilot_cli::discover_executors;
use runbookpilot_cli::parse_execution_mode;
use runbookpilot_cli::render_execution_result;
use runbookpilot_cli::verify_chain;
use runbookpilot_core::Alert;
use runbookpilot_core::ApprovalListFilter;
use runbookpilot_core::ApprovalQueue;
use runbookpilot_core::ApprovalRequestId;
use runbookpilot_core::AuditSink;
use runbookpilot_core::ExecutionId;
use runbookpilot_core::Orchestrator;
use runbookpilot_core::OrchestratorCallbacks;
use runbookpilot_core::SimulationMetricsCollector;
use runbookpilot_providers::NoopAdapter;
use runbookpilot_store_sqlite::SqliteStore;
use runbookpilot_store_sqlite::SqliteStoreConfig;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "runbookpilot", arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a runbook and optional alert, and drive one execution to completion.
    Run(RunCommand),
    /// Inspect and decide the approval queue.
    Approvals {
        /// Selected approvals subcommand.
        #[command(subcommand)]
        command: ApprovalsCommand,
    },
    /// Inspect the hash-chained audit log.
    Audit(AuditCommand),
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
struct RunCommand {
    /// Path to the runbook YAML document.
    #[arg(long, value_name = "PATH")]
    runbook: PathBuf,
    /// Path to an optional alert JSON document.
    #[arg(long, value_name = "PATH")]
    alert: Option<PathBuf>,
    /// Execution mode: production, simulation, or dry-run.
    #[arg(long, default_value = "production")]
    mode: String,
    /// `SQLite` database file backing persistence; omitted means in-memory.
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,
    /// Enables the L2 simulation tier (rejected otherwise).
    #[arg(long)]
    l2_enabled: bool,
}

/// Approval-queue subcommands.
#[derive(Subcommand, Debug)]
enum ApprovalsCommand {
    /// List pending approval requests.
    List(ApprovalsListCommand),
    /// Approve a pending request.
    Approve(ApprovalsDecideCommand),
    /// Deny a pending request.
    Deny(ApprovalsDenyCommand),
}

/// Arguments shared by every approvals subcommand.
#[derive(Args, Debug)]
struct ApprovalsListCommand {
    /// `SQLite` database file backing persistence; omitted means in-memory
    /// (and therefore always empty — `run` and `approvals` must share one
    /// `--store` path to interact with the same queue).
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,
    /// Restrict to one execution id.
    #[arg(long)]
    execution_id: Option<String>,
    /// Restrict to one runbook id.
    #[arg(long)]
    runbook_id: Option<String>,
    /// Maximum rows to return (0 means unbounded).
    #[arg(long, default_value_t = 0)]
    limit: u32,
    /// Rows to skip before `limit` is applied.
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

/// Arguments for `approvals approve`.
#[derive(Args, Debug)]
struct ApprovalsDecideCommand {
    /// `SQLite` database file backing persistence.
    #[arg(long, value_name = "PATH")]
    store: PathBuf,
    /// Request id to decide.
    #[arg(long)]
    request_id: String,
    /// Analyst identity recorded on the decision.
    #[arg(long)]
    approved_by: String,
}

/// Arguments for `approvals deny`.
#[derive(Args, Debug)]
struct ApprovalsDenyCommand {
    /// `SQLite` database file backing persistence.
    #[arg(long, value_name = "PATH")]
    store: PathBuf,
    /// Request id to decide.
    #[arg(long)]
    request_id: String,
    /// Analyst identity recorded on the decision.
    #[arg(long)]
    approved_by: String,
    /// Reason recorded on the denial.
    #[arg(long)]
    reason: String,
}

/// Arguments for the `audit` command.
#[derive(Args, Debug)]
struct AuditCommand {
    /// `SQLite` database file backing persistence.
    #[arg(long, value_name = "PATH")]
    store: PathBuf,
    /// Execution id whose chain to print.
    #[arg(long)]
    execution_id: String,
    /// Recompute and verify the chain's hash links before printing.
    #[arg(long)]
    verify: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Top-level CLI error.
#[derive(Debug, Error)]
enum CliError {
    /// A runbook document failed to load or validate.
    #[error("failed to load runbook: {0}")]
    Runbook(#[from] runbookpilot_config::RunbookLoadError),
    /// The alert file could not be read or parsed.
    #[error("failed to load alert {path}: {source}")]
    Alert {
        /// Path that failed to load.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The alert file was not a JSON object.
    #[error("alert document at {0} is not a JSON object")]
    AlertNotObject(String),
    /// The `--mode` flag was not recognized.
    #[error("{0}")]
    Mode(String),
    /// The `SQLite` store could not be opened.
    #[error("failed to open store: {0}")]
    Store(#[from] runbookpilot_store_sqlite::SqliteStoreError),
    /// The orchestrator itself failed (as opposed to one step).
    #[error("orchestration failed: {0}")]
    Orchestrator(#[from] runbookpilot_core::OrchestratorError),
    /// An approval-queue operation failed.
    #[error("approval queue error: {0}")]
    ApprovalQueue(#[from] runbookpilot_core::runtime::ApprovalQueueError),
    /// A persistence operation failed.
    #[error("store error: {0}")]
    StoreOp(#[from] runbookpilot_core::StoreError),
    /// Output could not be rendered as JSON.
    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
    /// Output could not be written to stdout/stderr.
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            if write_stderr_line(&format!("error: {err}")).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(command) => command_run(command).await,
        Commands::Approvals { command } => command_approvals(command).await,
        Commands::Audit(command) => command_audit(command).await,
    }
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

async fn command_run(command: RunCommand) -> CliResult<ExitCode> {
    let runbook = runbookpilot_config::load_runbook_file(&command.runbook)?;
    let alert = command.alert.as_deref().map(load_alert).transpose()?;
    let mode = parse_execution_mode(&command.mode).map_err(CliError::Mode)?;

    let store = open_store(command.store.as_deref())?;
    let orchestrator = Orchestrator::new(
        Arc::new(runbookpilot_core::runtime::AdapterRegistry::new()),
        Arc::new(ApprovalQueue::new(store.clone())),
        store.clone(),
        store,
        Arc::new(SimulationMetricsCollector::new()),
        command.l2_enabled,
    );

    for executor in discover_executors(&runbook) {
        orchestrator.register_adapter(executor.clone(), Arc::new(NoopAdapter::new(executor)));
    }

    let callbacks = OrchestratorCallbacks::default();
    let result = orchestrator.execute(&runbook, alert, mode, &callbacks).await?;

    let rendered = render_execution_result(&result);
    write_stdout_line(&serde_json::to_string_pretty(&rendered)?)?;
    Ok(if result.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn load_alert(path: &Path) -> CliResult<Alert> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| CliError::Alert { path: path.display().to_string(), source })?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(CliError::Render)?;
    let object = value.as_object().ok_or_else(|| CliError::AlertNotObject(path.display().to_string()))?;
    Ok(Alert::new(object.clone()))
}

fn open_store(path: Option<&Path>) -> CliResult<Arc<SqliteStore>> {
    let config = match path {
        Some(path) => SqliteStoreConfig { path: path.to_path_buf(), ..SqliteStoreConfig::in_memory() },
        None => SqliteStoreConfig::in_memory(),
    };
    Ok(Arc::new(SqliteStore::open(config)?))
}

// ============================================================================
// SECTION: Approvals Command
// ============================================================================

async fn command_approvals(command: ApprovalsCommand) -> CliResult<ExitCode> {
    match command {
        ApprovalsCommand::List(command) => command_approvals_list(command).await,
        ApprovalsCommand::Approve(command) => command_approvals_approve(command).await,
        ApprovalsCommand::Deny(command) => command_approvals_deny(command).await,
    }
}

async fn command_approvals_list(command: ApprovalsListCommand) -> CliResult<ExitCode> {
    let store = open_store(command.store.as_deref())?;
    let queue = ApprovalQueue::new(store);
    queue.expire_stale().await?;
    let filter = ApprovalListFilter {
        execution_id: command.execution_id.map(ExecutionId::new),
        runbook_id: command.runbook_id.map(runbookpilot_core::RunbookId::new),
        limit: command.limit,
        offset: command.offset,
    };
    let pending = queue.list_pending(&filter).await?;
    write_stdout_line(&serde_json::to_string_pretty(&pending)?)?;
    Ok(ExitCode::SUCCESS)
}

async fn command_approvals_approve(command: ApprovalsDecideCommand) -> CliResult<ExitCode> {
    let store = open_store(Some(&command.store))?;
    let queue = ApprovalQueue::new(store);
    let request_id = ApprovalRequestId::new(command.request_id);
    let decided = queue.approve(&request_id, &command.approved_by).await?;
    write_stdout_line(&serde_json::to_string_pretty(&decided)?)?;
    Ok(ExitCode::SUCCESS)
}

async fn command_approvals_deny(command: ApprovalsDenyCommand) -> CliResult<ExitCode> {
    let store = open_store(Some(&command.store))?;
    let queue = ApprovalQueue::new(store);
    let request_id = ApprovalRequestId::new(command.request_id);
    let decided = queue.deny(&request_id, &command.approved_by, &command.reason).await?;
    write_stdout_line(&serde_json::to_string_pretty(&decided)?)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Audit Command
// ============================================================================

async fn command_audit(command: AuditCommand) -> CliResult<ExitCode> {
    let store = open_store(Some(&command.store))?;
    let execution_id = ExecutionId::new(command.execution_id);
    let chain = store.chain_for(&execution_id).await?;

    if command.verify {
        if let Err(err) = verify_chain(&chain) {
            write_stderr_line(&format!("chain verification failed: {err}"))?;
            write_stdout_line(&serde_json::to_string_pretty(&chain)?)?;
            return Ok(ExitCode::FAILURE);
        }
    }

    write_stdout_line(&serde_json::to_string_pretty(&chain)?)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    use std::io::Write;
    writeln!(std::io::stdout(), "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    use std::io::Write;
    writeln!(std::io::stderr(), "{message}")
}
