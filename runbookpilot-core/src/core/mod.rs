// runbookpilot-core/src/core/mod.rs
// ============================================================================
// Module: RunbookPilot Core Types
// Description: Canonical RunbookPilot schema: runbooks, alerts, execution
//              state, approvals, audit entries, and simulation reports.
// Purpose: Provide stable, serializable types shared by the runtime engine
//          and any derived API surfaces (CLI, persistence, adapters).
// Dependencies: runbookpilot_logic, serde
// ============================================================================

//! ## Overview
//! RunbookPilot core types are the canonical source of truth for anything
//! derived from them: persisted rows, CLI output, and adapter payloads all
//! serialize these types rather than re-deriving their own shapes.

pub mod alert;
pub mod approval;
pub mod audit;
pub mod execution;
pub mod hashing;
pub mod identifiers;
pub mod runbook;
pub mod simulation;
pub mod time;
pub mod trigger;

pub use alert::Alert;
pub use alert::resolve_field_path;
pub use approval::ApprovalError;
pub use approval::ApprovalRequest;
pub use approval::ApprovalStatus;
pub use audit::AuditEntry;
pub use audit::AuditEventType;
pub use execution::ExecutionContext;
pub use execution::ExecutionMode;
pub use execution::ExecutionState;
pub use execution::StepResult;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use identifiers::ActionName;
pub use identifiers::ApprovalRequestId;
pub use identifiers::AuditEntryId;
pub use identifiers::ExecutionId;
pub use identifiers::ExecutorName;
pub use identifiers::RunbookId;
pub use identifiers::SimulationId;
pub use identifiers::StepId;
pub use runbook::AutomationLevel;
pub use runbook::OnError;
pub use runbook::OpaqueMap;
pub use runbook::OpaqueValue;
pub use runbook::RollbackSpec;
pub use runbook::Runbook;
pub use runbook::RunbookConfig;
pub use runbook::RunbookError;
pub use runbook::RunbookStep;
pub use runbook::TriggerFilter;
pub use simulation::PredictedOutcome;
pub use simulation::RiskLevel;
pub use simulation::RollbackPlanEntry;
pub use simulation::SimulatedStep;
pub use simulation::SimulationReport;
pub use simulation::StepImpact;
pub use time::Timestamp;
pub use trigger::TriggerCondition;
pub use trigger::TriggerExpr;
pub use trigger::TriggerOp;
