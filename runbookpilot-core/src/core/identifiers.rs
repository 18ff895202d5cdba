// runbookpilot-core/src/core/identifiers.rs
// ============================================================================
// Module: RunbookPilot Identifiers
// Description: Canonical opaque identifiers for runbooks, executions, and their
//              child records.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: rand, serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque and serialize as strings. Most are caller-supplied
//! (runbook and step ids come from the loaded runbook); execution, request,
//! and simulation ids are engine-generated UUIDv4 values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: UUIDv4 Generation
// ============================================================================

/// Generates a random UUIDv4 string without pulling in a dedicated UUID crate.
fn new_uuid_v4() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-\
         {:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0],
        bytes[1],
        bytes[2],
        bytes[3],
        bytes[4],
        bytes[5],
        bytes[6],
        bytes[7],
        bytes[8],
        bytes[9],
        bytes[10],
        bytes[11],
        bytes[12],
        bytes[13],
        bytes[14],
        bytes[15]
    )
}

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new ", stringify!($name), " from a caller-supplied value.")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(RunbookId, "Identifier of a loaded runbook.");
string_id!(StepId, "Identifier of a single step within a runbook, unique within it.");
string_id!(ActionName, "Name of the action bound to a step.");
string_id!(ExecutorName, "Name of the adapter/executor a step dispatches through.");
string_id!(ExecutionId, "UUIDv4 identifier of one runbook execution.");
string_id!(ApprovalRequestId, "UUIDv4 identifier of one approval queue request.");
string_id!(SimulationId, "UUIDv4 identifier of one simulation report.");
string_id!(AuditEntryId, "Monotonic identifier of one audit log row.");

impl ExecutionId {
    /// Generates a fresh execution id.
    #[must_use]
    pub fn generate() -> Self {
        Self(new_uuid_v4())
    }
}

impl ApprovalRequestId {
    /// Generates a fresh approval request id.
    #[must_use]
    pub fn generate() -> Self {
        Self(new_uuid_v4())
    }
}

impl SimulationId {
    /// Generates a fresh simulation id.
    #[must_use]
    pub fn generate() -> Self {
        Self(new_uuid_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionId;

    #[test]
    fn generated_ids_look_like_uuid_v4() {
        let id = ExecutionId::generate();
        let raw = id.as_str();
        assert_eq!(raw.len(), 36);
        assert_eq!(raw.as_bytes()[14], b'4');
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(ExecutionId::generate(), ExecutionId::generate());
    }
}
