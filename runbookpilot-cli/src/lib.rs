// runbookpilot-cli/src/lib.rs
// ============================================================================
// Module: CLI Support Library
// Description: Pure helpers backing the `runbookpilot` binary: executor
//              discovery, result rendering, and audit-chain verification.
// Purpose: Keep `main.rs` a thin argument/IO shell so this logic is unit
//          testable without spawning a process.
// Dependencies: runbookpilot-core, serde_json
// ============================================================================

//! ## Overview
//! Everything here is side-effect-free: given a `Runbook` or an
//! `ExecutionResult`/`AuditEntry` slice already in hand, these functions
//! compute what the binary prints. `main.rs` owns argument parsing, file IO,
//! and wiring the orchestrator's collaborators.

use std::collections::BTreeSet;

use runbookpilot_core::AuditEntry;
use runbookpilot_core::ExecutionMode;
use runbookpilot_core::ExecutionResult;
use runbookpilot_core::Runbook;
use runbookpilot_core::runtime::compute_hash;

/// Collects every distinct executor name a runbook's steps (and their
/// rollback clauses) dispatch through, so the demo binary can register one
/// [`runbookpilot_providers::NoopAdapter`] per name without the caller
/// having to enumerate them by hand.
#[must_use]
pub fn discover_executors(runbook: &Runbook) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for step in &runbook.steps {
        names.insert(step.executor.to_string());
        if let Some(rollback) = &step.rollback {
            if let Some(executor) = &rollback.executor {
                names.insert(executor.to_string());
            } else {
                names.insert(step.executor.to_string());
            }
        }
    }
    names
}

/// Parses a `--mode` flag value into an [`ExecutionMode`].
///
/// # Errors
/// Returns an error string when `raw` is not one of `production`,
/// `simulation`, or `dry-run`.
pub fn parse_execution_mode(raw: &str) -> Result<ExecutionMode, String> {
    match raw {
        "production" => Ok(ExecutionMode::Production),
        "simulation" => Ok(ExecutionMode::Simulation),
        "dry-run" => Ok(ExecutionMode::DryRun),
        other => Err(format!("unknown mode '{other}': expected production, simulation, or dry-run")),
    }
}

/// Renders an [`ExecutionResult`] as the JSON document the `run` command
/// prints to stdout.
#[must_use]
pub fn render_execution_result(result: &ExecutionResult) -> serde_json::Value {
    serde_json::json!({
        "execution_id": result.context.execution_id.to_string(),
        "state": result.context.state,
        "success": result.success,
        "steps": result.steps,
        "simulation": result.simulation,
        "error": result.error,
    })
}

/// One audit-chain verification failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainVerificationError {
    /// The first entry carried a non-null `prev_hash`.
    #[error("entry {0} is first in the chain but carries a prev_hash")]
    FirstEntryHasPrevHash(String),
    /// An entry's `prev_hash` did not match the previous entry's `hash`.
    #[error("entry {entry} does not chain to its predecessor {expected}")]
    BrokenLink {
        /// The entry whose `prev_hash` was wrong.
        entry: String,
        /// The hash it should have carried.
        expected: String,
    },
    /// An entry's stored `hash` does not match its recomputed value.
    #[error("entry {0} hash does not match its recomputed value")]
    HashMismatch(String),
}

/// Recomputes every entry's hash from its logical fields and confirms the
/// chain links up: the first entry carries no `prev_hash`, and every later
/// entry's `prev_hash` matches its predecessor's stored `hash`.
///
/// # Errors
/// Returns the first [`ChainVerificationError`] encountered, in chain order.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), ChainVerificationError> {
    let mut previous_hash: Option<&str> = None;
    for entry in entries {
        match (previous_hash, entry.prev_hash.as_deref()) {
            (None, Some(_)) => {
                return Err(ChainVerificationError::FirstEntryHasPrevHash(entry.id.to_string()));
            }
            (Some(expected), actual) if actual != Some(expected) => {
                return Err(ChainVerificationError::BrokenLink {
                    entry: entry.id.to_string(),
                    expected: expected.to_string(),
                });
            }
            _ => {}
        }

        let recomputed = compute_hash(
            entry.prev_hash.as_deref(),
            entry.event_type,
            &entry.execution_id,
            &entry.details,
            entry.created_at,
        );
        match recomputed {
            Ok(hash) if hash == entry.hash => {}
            _ => return Err(ChainVerificationError::HashMismatch(entry.id.to_string())),
        }

        previous_hash = Some(&entry.hash);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use runbookpilot_core::ActionName;
    use runbookpilot_core::AutomationLevel;
    use runbookpilot_core::ExecutorName;
    use runbookpilot_core::OnError;
    use runbookpilot_core::OpaqueMap;
    use runbookpilot_core::RollbackSpec;
    use runbookpilot_core::RunbookConfig;
    use runbookpilot_core::RunbookId;
    use runbookpilot_core::RunbookStep;
    use runbookpilot_core::StepId;

    use super::*;

    fn runbook_with(steps: Vec<RunbookStep>) -> Runbook {
        Runbook {
            id: RunbookId::new("rb"),
            version: "1".to_string(),
            name: "rb".to_string(),
            metadata: OpaqueMap::new(),
            triggers: Vec::new(),
            config: RunbookConfig {
                automation_level: AutomationLevel::L0,
                max_execution_time: 60,
                requires_approval: false,
                rollback_on_failure: true,
            },
            steps,
        }
    }

    #[test]
    fn discover_executors_collects_step_and_rollback_executors() {
        let runbook = runbook_with(vec![RunbookStep {
            id: StepId::new("s1"),
            name: "s1".to_string(),
            action: ActionName::new("block_ip"),
            executor: ExecutorName::new("edr"),
            parameters: OpaqueMap::new(),
            depends_on: Vec::new(),
            condition: None,
            on_error: OnError::Halt,
            timeout: 30,
            approval_required: None,
            rollback: Some(RollbackSpec {
                action: ActionName::new("unblock_ip"),
                executor: Some(ExecutorName::new("firewall")),
                parameters: OpaqueMap::new(),
                timeout: 30,
            }),
        }]);
        let executors = discover_executors(&runbook);
        assert_eq!(executors, BTreeSet::from(["edr".to_string(), "firewall".to_string()]));
    }

    #[test]
    fn discover_executors_falls_back_to_step_executor_for_rollback() {
        let runbook = runbook_with(vec![RunbookStep {
            id: StepId::new("s1"),
            name: "s1".to_string(),
            action: ActionName::new("collect_logs"),
            executor: ExecutorName::new("siem"),
            parameters: OpaqueMap::new(),
            depends_on: Vec::new(),
            condition: None,
            on_error: OnError::Continue,
            timeout: 30,
            approval_required: None,
            rollback: Some(RollbackSpec {
                action: ActionName::new("collect_logs"),
                executor: None,
                parameters: OpaqueMap::new(),
                timeout: 30,
            }),
        }]);
        assert_eq!(discover_executors(&runbook), BTreeSet::from(["siem".to_string()]));
    }

    #[test]
    fn parse_execution_mode_rejects_unknown_values() {
        assert!(parse_execution_mode("production").is_ok());
        assert!(parse_execution_mode("bogus").is_err());
    }

    #[test]
    fn verify_chain_accepts_an_empty_chain() {
        assert!(verify_chain(&[]).is_ok());
    }

    #[test]
    fn verify_chain_rejects_a_tampered_entry() {
        use runbookpilot_core::AuditEntryId;
        use runbookpilot_core::AuditEventType;
        use runbookpilot_core::ExecutionId;
        use runbookpilot_core::Timestamp;

        let execution_id = ExecutionId::generate();
        let created_at = Timestamp::now();
        let hash = compute_hash(None, AuditEventType::ExecutionStarted, &execution_id, &serde_json::json!({}), created_at)
            .unwrap_or_else(|_| unreachable!("empty object always canonicalizes"));
        let mut entry = AuditEntry {
            id: AuditEntryId::new("1"),
            execution_id,
            runbook_id: RunbookId::new("rb"),
            event_type: AuditEventType::ExecutionStarted,
            actor: "engine".to_string(),
            details: serde_json::json!({}),
            prev_hash: None,
            hash,
            created_at,
        };
        assert!(verify_chain(std::slice::from_ref(&entry)).is_ok());
        entry.hash = "tampered".to_string();
        assert!(verify_chain(&[entry]).is_err());
    }
}
