// runbookpilot-core/src/runtime/classifier.rs
// ============================================================================
// Module: Action Classifier
// Description: Static two-set partition of action names into read/write.
// Purpose: Feed the L1 executor's approval gating and the impact assessor's
//          blast-radius defaults.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Unknown action names classify as `write` — the safe default, since an
//! unrecognized action might mutate state and the engine would rather ask
//! for approval than auto-execute it.

/// Whether an action reads or writes external state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    /// The action only queries; no approval required under L1.
    Read,
    /// The action mutates external systems; requires approval under L1.
    Write,
}

/// Action names known to be read-only.
const READ_ACTIONS: &[&str] = &[
    "query_siem",
    "enrich_ioc",
    "lookup_asset",
    "search_logs",
    "get_user_info",
    "get_host_info",
    "check_reputation",
    "list_alerts",
    "get_process_tree",
];

/// Action names known to mutate external systems, with their classifier entry
/// kept explicit even though "unknown ⇒ write" would cover them too —
/// documents intent rather than relying on the default.
const WRITE_ACTIONS: &[&str] = &[
    "isolate_host",
    "disable_account",
    "block_ip",
    "quarantine_file",
    "kill_process",
    "revoke_token",
    "reset_password",
    "create_ticket",
    "add_firewall_rule",
    "collect_logs",
];

/// Classifies an action name.
#[must_use]
pub fn classify(action: &str) -> ActionClass {
    if READ_ACTIONS.contains(&action) {
        ActionClass::Read
    } else {
        // WRITE_ACTIONS is checked only to keep intent explicit in source;
        // anything not in READ_ACTIONS classifies as Write regardless.
        let _ = WRITE_ACTIONS;
        ActionClass::Write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_read_actions_classify_as_read() {
        assert_eq!(classify("query_siem"), ActionClass::Read);
    }

    #[test]
    fn known_write_actions_classify_as_write() {
        assert_eq!(classify("block_ip"), ActionClass::Write);
    }

    #[test]
    fn unknown_actions_default_to_write() {
        assert_eq!(classify("some_future_action"), ActionClass::Write);
    }
}
