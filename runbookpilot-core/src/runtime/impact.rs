// runbookpilot-core/src/runtime/impact.rs
// ============================================================================
// Module: Impact Assessor
// Description: Deterministic per-step risk score, blast radius, and rollback
//              availability for write actions.
// Purpose: Feed the L2 simulation tier's SimulationReport.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Every number here comes from a static table, never from adapter output:
//! re-running the assessor against the same step and parameters always
//! produces the same [`crate::core::StepImpact`].

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::OpaqueMap;
use crate::core::RiskLevel;
use crate::core::RollbackSpec;
use crate::core::StepImpact;
use crate::runtime::classifier::ActionClass;
use crate::runtime::classifier::classify;

/// Static `action → risk score` table. Reads are always `1`; writes range `2..=9`.
fn base_score(action: &str) -> u8 {
    match action {
        "collect_logs" => 2,
        "create_ticket" => 2,
        "add_firewall_rule" => 5,
        "reset_password" => 5,
        "block_ip" => 6,
        "quarantine_file" => 6,
        "revoke_token" => 6,
        "kill_process" => 7,
        "disable_account" => 8,
        "isolate_host" => 9,
        _ => match classify(action) {
            ActionClass::Read => 1,
            ActionClass::Write => 6,
        },
    }
}

/// Static "reversible" lookup: actions with a known reverse pairing, modelled
/// as a lookup table rather than a graph since every pairing is one-directional
/// per action (e.g. `isolate_host` is reversed by `restore_host`, never the
/// other way around for this table's purposes).
fn has_known_rollback_pair(action: &str) -> bool {
    matches!(
        action,
        "isolate_host" | "disable_account" | "block_ip" | "quarantine_file" | "revoke_token"
    )
}

/// Parameter keys scanned for blast-radius scalar/array values, paired with
/// the asset-kind bucket they contribute to.
const BLAST_RADIUS_KEYS: &[(&str, &str)] = &[
    ("host_id", "host"),
    ("hostname", "host"),
    ("ip", "host"),
    ("ip_address", "host"),
    ("domain", "host"),
    ("account", "user"),
    ("user", "user"),
    ("file_path", "file"),
    ("process_id", "process"),
];

/// Action names whose blast radius is enforced to a floor of `≥1` on their
/// primary counter even when no matching parameter key was found.
fn categorical_floor(action: &str) -> Option<&'static str> {
    match action {
        "isolate_host" => Some("host"),
        "disable_account" => Some("user"),
        "block_ip" => Some("host"),
        _ => None,
    }
}

/// Dependency scan keys (services/systems a write action touches).
const DEPENDENCY_KEYS: &[&str] = &["service", "services", "system", "systems"];

fn count_values(value: &Value, counter: &mut u64) {
    match value {
        Value::Array(items) => *counter += items.len() as u64,
        Value::Null => {}
        _ => *counter += 1,
    }
}

/// Scans `parameters` for blast-radius and dependency keys, returning the
/// per-asset-kind counters and the dependency names touched.
#[must_use]
pub fn blast_radius(action: &str, parameters: &OpaqueMap) -> (BTreeMap<String, u64>, Vec<String>) {
    let mut counters: BTreeMap<String, u64> = BTreeMap::new();
    for (key, bucket) in BLAST_RADIUS_KEYS {
        if let Some(value) = parameters.get(*key) {
            count_values(value, counters.entry((*bucket).to_string()).or_insert(0));
        }
    }
    if let Some(bucket) = categorical_floor(action) {
        let entry = counters.entry(bucket.to_string()).or_insert(0);
        if *entry == 0 {
            *entry = 1;
        }
    }

    let mut dependencies = Vec::new();
    for key in DEPENDENCY_KEYS {
        if let Some(value) = parameters.get(*key) {
            match value {
                Value::Array(items) => {
                    dependencies.extend(items.iter().filter_map(Value::as_str).map(String::from));
                }
                Value::String(s) => dependencies.push(s.clone()),
                _ => {}
            }
        }
    }
    (counters, dependencies)
}

/// Assesses one write step's impact. Returns `None` for read actions, which
/// the simulation report never scores.
#[must_use]
pub fn assess(action: &str, parameters: &OpaqueMap, rollback: Option<&RollbackSpec>) -> Option<StepImpact> {
    if matches!(classify(action), ActionClass::Read) {
        return None;
    }

    let risk_score = base_score(action);
    let risk_level = RiskLevel::from_score(risk_score);
    let rollback_available = has_known_rollback_pair(action) || rollback.is_some();
    let (blast_radius, dependencies) = blast_radius(action, parameters);

    let counts_summary = blast_radius
        .iter()
        .map(|(kind, count)| format!("{count} {kind}(s)"))
        .collect::<Vec<_>>()
        .join(", ");
    let rollback_hint =
        if rollback_available { "rollback available" } else { "no rollback available" };
    let dependency_hint = if dependencies.is_empty() {
        String::new()
    } else {
        format!(" affecting {}", dependencies.join(", "))
    };
    let summary = format!(
        "'{action}' is a {risk_level:?}-risk write action impacting {counts_summary}{dependency_hint}; {rollback_hint}."
    );

    Some(StepImpact { risk_score, risk_level, rollback_available, blast_radius, summary })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_actions_are_not_assessed() {
        assert!(assess("query_siem", &OpaqueMap::new(), None).is_none());
    }

    #[test]
    fn isolate_host_floors_the_host_counter_even_without_params() {
        let Some(impact) = assess("isolate_host", &OpaqueMap::new(), None) else {
            unreachable!("isolate_host is a write action")
        };
        assert_eq!(impact.blast_radius.get("host"), Some(&1));
        assert!(impact.rollback_available);
        assert_eq!(impact.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn block_ip_counts_array_parameter() {
        let mut params = OpaqueMap::new();
        params.insert("ip_address".to_string(), serde_json::json!(["1.1.1.1", "2.2.2.2"]));
        let Some(impact) = assess("block_ip", &params, None) else {
            unreachable!("block_ip is a write action")
        };
        assert_eq!(impact.blast_radius.get("host"), Some(&2));
    }

    #[test]
    fn unknown_write_action_without_rollback_reports_unavailable() {
        let Some(impact) = assess("custom_mutation", &OpaqueMap::new(), None) else {
            unreachable!("unknown actions default to write")
        };
        assert!(!impact.rollback_available);
    }

    #[test]
    fn declared_rollback_clause_makes_rollback_available_regardless_of_pair_table() {
        let rollback = RollbackSpec {
            action: crate::core::ActionName::new("undo"),
            executor: None,
            parameters: OpaqueMap::new(),
            timeout: 10,
        };
        let Some(impact) = assess("custom_mutation", &OpaqueMap::new(), Some(&rollback)) else {
            unreachable!("unknown actions default to write")
        };
        assert!(impact.rollback_available);
    }
}
