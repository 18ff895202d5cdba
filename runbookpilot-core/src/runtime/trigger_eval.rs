// runbookpilot-core/src/runtime/trigger_eval.rs
// ============================================================================
// Module: Trigger Evaluator
// Description: Decides whether an alert activates a runbook's trigger filter.
// Purpose: Combine the structural filter (detection source, MITRE technique,
//          platform, severity) with an optional expression tree evaluated
//          through the shared tri-state requirement algebra.
// Dependencies: runbookpilot_logic, serde_json
// ============================================================================

//! ## Overview
//! Structural filter clauses are evaluated directly; the optional expression
//! tree is handed to [`runbookpilot_logic::Requirement`] by wrapping each
//! [`crate::core::TriggerCondition`] leaf in a [`runbookpilot_logic::PredicateEval`]
//! implementation over an [`AlertReader`]. This reuses the same universal
//! `and`/`or`/`not` combinators the logic crate already provides rather than
//! hand-rolling a second boolean evaluator.

use runbookpilot_logic::PredicateEval;
use runbookpilot_logic::Requirement;
use serde_json::Value;

use crate::core::Alert;
use crate::core::TriggerCondition;
use crate::core::TriggerExpr;
use crate::core::TriggerFilter;
use crate::core::TriggerOp;

/// Outcome of evaluating one runbook's trigger filter against one alert.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvaluation {
    /// Whether the alert activates this runbook.
    pub matched: bool,
    /// Always `"alert"` for this trigger source.
    pub trigger_type: &'static str,
    /// Total number of filter clauses (structural + expression) evaluated.
    pub conditions_evaluated: u32,
    /// Number of those clauses that passed.
    pub conditions_passed: u32,
    /// Concatenation of failure reasons, empty when `matched`.
    pub reason: Option<String>,
}

/// Evaluates `filter` against `alert`, combining structural clauses with an
/// optional expression tree.
#[must_use]
pub fn evaluate_trigger(filter: &TriggerFilter, alert: &Alert) -> TriggerEvaluation {
    let has_constraint = !filter.detection_sources.is_empty()
        || !filter.mitre_techniques.is_empty()
        || !filter.platforms.is_empty()
        || !filter.severity.is_empty()
        || filter.expression.is_some();

    if alert.event_kind() != "alert" && has_constraint {
        return TriggerEvaluation {
            matched: false,
            trigger_type: "alert",
            conditions_evaluated: 0,
            conditions_passed: 0,
            reason: Some("event.kind is not \"alert\"".to_string()),
        };
    }

    let mut evaluated = 0u32;
    let mut passed = 0u32;
    let mut failures = Vec::new();

    if !filter.detection_sources.is_empty() {
        evaluated += 1;
        let source = detection_source(alert);
        let ok = source.as_deref().is_some_and(|s| filter.detection_sources.iter().any(|d| d == s));
        if ok {
            passed += 1;
        } else {
            failures.push("detection source did not match".to_string());
        }
    }

    if !filter.mitre_techniques.is_empty() {
        evaluated += 1;
        let techniques = alert_techniques(alert);
        let ok = filter
            .mitre_techniques
            .iter()
            .any(|trigger| techniques.iter().any(|observed| technique_matches(trigger, observed)));
        if ok {
            passed += 1;
        } else {
            failures.push("no MITRE technique matched".to_string());
        }
    }

    if !filter.platforms.is_empty() {
        evaluated += 1;
        let platform = alert.field_path("host.os.platform").and_then(Value::as_str);
        let ok = platform.is_some_and(|p| filter.platforms.iter().any(|f| f == p));
        if ok {
            passed += 1;
        } else {
            failures.push("platform did not match".to_string());
        }
    }

    if !filter.severity.is_empty() {
        evaluated += 1;
        let label = alert_severity_label(alert);
        let ok = label.as_deref().is_some_and(|l| filter.severity.iter().any(|f| f == l));
        if ok {
            passed += 1;
        } else {
            failures.push("severity did not match".to_string());
        }
    }

    if let Some(expr) = &filter.expression {
        evaluated += 1;
        let reader = AlertReader { alert };
        let requirement = to_requirement(expr);
        if requirement.eval(&reader, 0) {
            passed += 1;
        } else {
            failures.push("expression did not match".to_string());
        }
    }

    let matched = evaluated == passed;
    TriggerEvaluation {
        matched,
        trigger_type: "alert",
        conditions_evaluated: evaluated,
        conditions_passed: passed,
        reason: if matched { None } else { Some(failures.join("; ")) },
    }
}

/// Detection source inference order: `x-detectforge` metadata, then tags,
/// then `event.dataset`.
fn detection_source(alert: &Alert) -> Option<String> {
    if let Some(source) =
        alert.field_path("x-detectforge.detection_source").and_then(Value::as_str)
    {
        return Some(source.to_string());
    }
    if let Some(tags) = alert.field_path("tags").and_then(Value::as_array) {
        if let Some(tag) = tags.iter().find_map(Value::as_str) {
            return Some(tag.to_string());
        }
    }
    alert.field_path("event.dataset").and_then(Value::as_str).map(ToString::to_string)
}

/// Collects MITRE technique ids from the alert's conventional ECS location.
fn alert_techniques(alert: &Alert) -> Vec<String> {
    match alert.field_path("threat.technique.id") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(String::from).collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

/// Exact match, or parent match via the `"<parent>."` prefix rule
/// (`T1059` matches `T1059.001`).
fn technique_matches(trigger: &str, observed: &str) -> bool {
    trigger == observed || observed.starts_with(&format!("{trigger}."))
}

/// Buckets a numeric `0..=100` severity into its label.
fn alert_severity_label(alert: &Alert) -> Option<String> {
    let score = alert.field_path("event.severity").and_then(Value::as_f64)?;
    let label = match score {
        s if (0.0 ..25.0).contains(&s) => "low",
        s if (25.0 ..50.0).contains(&s) => "medium",
        s if (50.0 ..75.0).contains(&s) => "high",
        _ => "critical",
    };
    Some(label.to_string())
}

// ============================================================================
// SECTION: Expression Tree Bridge
// ============================================================================

/// Read-only view over one alert, used as the reader type for the expression
/// tree's predicate evaluation.
pub struct AlertReader<'a> {
    alert: &'a Alert,
}

impl PredicateEval for TriggerCondition {
    type Reader<'a> = AlertReader<'a>;

    fn eval_row(&self, reader: &Self::Reader<'_>, _row: usize) -> bool {
        eval_condition(self, reader.alert)
    }
}

/// Builds a [`Requirement`] tree from a [`TriggerExpr`], translating `and`/
/// `or`/`not` directly onto the logic crate's combinators.
fn to_requirement(expr: &TriggerExpr) -> Requirement<TriggerCondition> {
    match expr {
        TriggerExpr::Condition(condition) => Requirement::predicate(condition.clone()),
        TriggerExpr::And(children) => Requirement::and(children.iter().map(to_requirement).collect()),
        TriggerExpr::Or(children) => Requirement::or(children.iter().map(to_requirement).collect()),
        TriggerExpr::Not(child) => Requirement::negate(to_requirement(child)),
    }
}

/// Evaluates one leaf condition against `alert`.
fn eval_condition(condition: &TriggerCondition, alert: &Alert) -> bool {
    let field = alert.field_path(&condition.field);

    match condition.op {
        TriggerOp::Exists => {
            let present = field.is_some_and(|v| !v.is_null());
            match condition.value.as_bool() {
                Some(false) => !present,
                _ => present,
            }
        }
        TriggerOp::Eq => field.is_some_and(|v| v == &condition.value),
        TriggerOp::Ne => !field.is_some_and(|v| v == &condition.value),
        TriggerOp::Gt | TriggerOp::Lt | TriggerOp::Gte | TriggerOp::Lte => {
            let Some(left) = field.and_then(Value::as_f64) else { return false };
            let Some(right) = condition.value.as_f64() else { return false };
            match condition.op {
                TriggerOp::Gt => left > right,
                TriggerOp::Lt => left < right,
                TriggerOp::Gte => left >= right,
                TriggerOp::Lte => left <= right,
                _ => unreachable!("guarded by outer match"),
            }
        }
        TriggerOp::In => {
            let Some(candidates) = condition.value.as_array() else { return false };
            field.is_some_and(|v| candidates.contains(v))
        }
        TriggerOp::Contains => match field {
            Some(Value::Array(items)) => items.contains(&condition.value),
            Some(Value::String(text)) => {
                condition.value.as_str().is_some_and(|needle| text.contains(needle))
            }
            _ => false,
        },
        TriggerOp::Matches => {
            let (Some(text), Some(pattern)) = (field.and_then(Value::as_str), condition.value.as_str())
            else {
                return false;
            };
            regex_lite_matches(pattern, text)
        }
    }
}

/// Minimal regex matcher: compiles `pattern` case-sensitively and returns
/// `false` (never panics) on an invalid pattern.
fn regex_lite_matches(pattern: &str, text: &str) -> bool {
    match regex::Regex::new(pattern) {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn alert_with(document: Value) -> Alert {
        let Some(object) = document.as_object() else { unreachable!("json! object literal above") };
        Alert::new(object.clone())
    }

    #[test]
    fn parent_technique_matches_child_via_prefix_rule() {
        let alert = alert_with(json!({
            "event": {"kind": "alert"},
            "threat": {"technique": {"id": ["T1059.001"]}},
        }));
        let filter = TriggerFilter { mitre_techniques: vec!["T1059".to_string()], ..Default::default() };
        let result = evaluate_trigger(&filter, &alert);
        assert!(result.matched);
    }

    #[test]
    fn sibling_technique_does_not_match() {
        let alert = alert_with(json!({
            "event": {"kind": "alert"},
            "threat": {"technique": {"id": ["T1059.002"]}},
        }));
        let filter = TriggerFilter { mitre_techniques: vec!["T1059.001".to_string()], ..Default::default() };
        assert!(!evaluate_trigger(&filter, &alert).matched);
    }

    #[test]
    fn non_alert_event_kind_rejects_when_filter_has_constraints() {
        let alert = alert_with(json!({"event": {"kind": "metric"}}));
        let filter = TriggerFilter { platforms: vec!["linux".to_string()], ..Default::default() };
        assert!(!evaluate_trigger(&filter, &alert).matched);
    }

    #[test]
    fn unconstrained_filter_matches_any_alert() {
        let alert = alert_with(json!({"event": {"kind": "metric"}}));
        let filter = TriggerFilter::default();
        assert!(evaluate_trigger(&filter, &alert).matched);
    }

    #[test]
    fn severity_label_bucketing_matches_filter() {
        let alert = alert_with(json!({"event": {"kind": "alert", "severity": 80}}));
        let filter = TriggerFilter { severity: vec!["critical".to_string()], ..Default::default() };
        assert!(evaluate_trigger(&filter, &alert).matched);
    }

    #[test]
    fn expression_tree_and_or_not_combine_via_the_logic_crate() {
        let alert = alert_with(json!({"event": {"kind": "alert"}, "host": {"name": "web-01"}}));
        let expr = TriggerExpr::And(vec![
            TriggerExpr::Condition(TriggerCondition {
                field: "host.name".to_string(),
                op: TriggerOp::Eq,
                value: json!("web-01"),
            }),
            TriggerExpr::Not(Box::new(TriggerExpr::Condition(TriggerCondition {
                field: "host.name".to_string(),
                op: TriggerOp::Eq,
                value: json!("db-01"),
            }))),
        ]);
        let filter = TriggerFilter { expression: Some(expr), ..Default::default() };
        assert!(evaluate_trigger(&filter, &alert).matched);
    }

    #[test]
    fn invalid_regex_is_false_not_a_panic() {
        let alert = alert_with(json!({"event": {"kind": "alert"}, "host": {"name": "web-01"}}));
        let expr = TriggerExpr::Condition(TriggerCondition {
            field: "host.name".to_string(),
            op: TriggerOp::Matches,
            value: json!("("),
        });
        let filter = TriggerFilter { expression: Some(expr), ..Default::default() };
        assert!(!evaluate_trigger(&filter, &alert).matched);
    }
}
