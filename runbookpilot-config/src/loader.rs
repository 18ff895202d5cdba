// runbookpilot-config/src/loader.rs
// ============================================================================
// Module: Runbook Loader
// Description: Reads, size-bounds, parses, and validates a runbook document.
// Purpose: Keep untrusted YAML from reaching the orchestrator in any form
//          other than a structurally valid Runbook.
// Dependencies: runbookpilot-core, serde_yaml, std::fs
// ============================================================================

use std::fs;
use std::path::Path;

use runbookpilot_core::Runbook;
use runbookpilot_core::RunbookError;

use crate::schema::validate_runbook_schema;
use crate::schema::SchemaError;

/// Maximum accepted runbook document size, in bytes.
pub const MAX_RUNBOOK_FILE_BYTES: u64 = 1024 * 1024;

/// Errors raised while loading a runbook document.
#[derive(Debug, thiserror::Error)]
pub enum RunbookLoadError {
    /// The file could not be read.
    #[error("failed to read runbook file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document exceeded [`MAX_RUNBOOK_FILE_BYTES`].
    #[error("runbook document is {actual} bytes, exceeding the {limit} byte limit")]
    TooLarge {
        /// Actual document size in bytes.
        actual: u64,
        /// The enforced limit.
        limit: u64,
    },
    /// The document was not valid YAML, or did not match the runbook schema.
    #[error("runbook document failed to parse: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// The document parsed but failed a structural invariant.
    #[error("runbook document is invalid: {0}")]
    Invalid(#[from] RunbookError),
    /// The document violated the runbook JSON Schema.
    #[error("runbook document failed schema validation: {0}")]
    Schema(#[from] SchemaError),
}

/// Loads and validates a runbook from `path`.
///
/// # Errors
/// Returns [`RunbookLoadError`] if the file cannot be read, exceeds
/// [`MAX_RUNBOOK_FILE_BYTES`], fails to parse, or fails [`Runbook::validate`].
pub fn load_runbook_file(path: &Path) -> Result<Runbook, RunbookLoadError> {
    let metadata = fs::metadata(path).map_err(|source| RunbookLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if metadata.len() > MAX_RUNBOOK_FILE_BYTES {
        return Err(RunbookLoadError::TooLarge { actual: metadata.len(), limit: MAX_RUNBOOK_FILE_BYTES });
    }

    let raw = fs::read_to_string(path).map_err(|source| RunbookLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_runbook_str(&raw)
}

/// Parses and validates a runbook from an in-memory YAML string.
///
/// # Errors
/// Returns [`RunbookLoadError`] if `raw` exceeds [`MAX_RUNBOOK_FILE_BYTES`],
/// fails to parse, or fails [`Runbook::validate`].
pub fn load_runbook_str(raw: &str) -> Result<Runbook, RunbookLoadError> {
    if raw.len() as u64 > MAX_RUNBOOK_FILE_BYTES {
        return Err(RunbookLoadError::TooLarge { actual: raw.len() as u64, limit: MAX_RUNBOOK_FILE_BYTES });
    }

    let document: serde_json::Value = serde_yaml::from_str(raw)?;
    validate_runbook_schema(&document)?;

    let runbook: Runbook = serde_yaml::from_str(raw)?;
    runbook.validate()?;
    Ok(runbook)
}
