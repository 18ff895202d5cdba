// runbookpilot-config/src/lib.rs
// ============================================================================
// Module: Runbook Config Library
// Description: Fail-closed loading of runbook YAML documents.
// Purpose: Single entry point turning an untrusted YAML file or string into
//          a validated, in-memory Runbook.
// Dependencies: runbookpilot-core, serde_yaml
// ============================================================================

//! ## Overview
//! Runbook documents are untrusted input: an operator-authored YAML file that
//! may be stale, malformed, or oversized. Loading here is strict and
//! fail-closed — oversized documents and structurally invalid runbooks are
//! rejected before the orchestrator ever sees them. This crate owns nothing
//! the engine runs against at execution time; `runbookpilot_core::Runbook` is
//! the only artifact it produces.

pub mod docs;
pub mod loader;
pub mod schema;

pub use docs::runbook_docs_markdown;
pub use loader::load_runbook_file;
pub use loader::load_runbook_str;
pub use loader::RunbookLoadError;
pub use loader::MAX_RUNBOOK_FILE_BYTES;
pub use schema::runbook_schema;
pub use schema::validate_runbook_schema;
pub use schema::SchemaError;
