// runbookpilot-core/src/runtime/templating.rs
// ============================================================================
// Module: Parameter Templating
// Description: `{{ path | default: literal }}` substitution over the
//              per-execution variable resolution context.
// Purpose: Resolve step parameters and condition guards against the alert,
//          prior step outputs, execution context, and environment.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! `resolve` walks a parameter value recursively. String leaves containing
//! `{{ … }}` occurrences get each occurrence substituted; a leaf that is
//! *entirely* one `{{ … }}` expression keeps the resolved value's native
//! type (so `{{ steps.s1.output.risk_score }}` stays a number), while a
//! leaf with surrounding text always stringifies. Unresolved paths are
//! reported alongside the resolved value so callers can decide how strict
//! to be.

use serde_json::Value;

use crate::core::alert::resolve_field_path;

/// Layered context templating resolves paths against.
pub struct TemplateContext<'a> {
    /// The alert driving this execution, reached via the `alert.` prefix.
    pub alert: Option<&'a Value>,
    /// Per-step outputs, reached via `steps.<id>.output.`.
    pub steps: &'a Value,
    /// Execution-scoped variables, reached via the `context.` prefix.
    pub context: &'a Value,
    /// Process environment, reached via the `env.` prefix.
    pub env: &'a Value,
}

/// Outcome of resolving one value against a [`TemplateContext`].
pub struct Resolved {
    /// The resolved value.
    pub value: Value,
    /// Dotted paths that could not be resolved, in encounter order.
    pub unresolved_paths: Vec<String>,
}

/// Recursively resolves `{{ … }}` occurrences in `value` against `ctx`.
#[must_use]
pub fn resolve(value: &Value, ctx: &TemplateContext<'_>) -> Resolved {
    let mut unresolved = Vec::new();
    let resolved = resolve_inner(value, ctx, &mut unresolved);
    Resolved { value: resolved, unresolved_paths: unresolved }
}

fn resolve_inner(value: &Value, ctx: &TemplateContext<'_>, unresolved: &mut Vec<String>) -> Value {
    match value {
        Value::String(text) => resolve_string(text, ctx, unresolved),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| resolve_inner(item, ctx, unresolved)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter().map(|(k, v)| (k.clone(), resolve_inner(v, ctx, unresolved))).collect(),
        ),
        other => other.clone(),
    }
}

/// Matches a single `{{ ... }}` expression, capturing the inner text.
fn find_expression(text: &str, start: usize) -> Option<(usize, usize, &str)> {
    let open = text[start ..].find("{{")? + start;
    let close = text[open ..].find("}}")? + open;
    Some((open, close + 2, text[open + 2 .. close].trim()))
}

fn resolve_string(text: &str, ctx: &TemplateContext<'_>, unresolved: &mut Vec<String>) -> Value {
    let Some((open, close, expr)) = find_expression(text, 0) else {
        return Value::String(text.to_string());
    };

    let is_whole = open == 0 && close == text.len();
    if is_whole {
        return resolve_expression(expr, ctx, unresolved);
    }

    let mut out = String::new();
    let mut cursor = 0usize;
    loop {
        match find_expression(text, cursor) {
            Some((open, close, expr)) => {
                out.push_str(&text[cursor .. open]);
                let resolved = resolve_expression(expr, ctx, unresolved);
                out.push_str(&stringify(&resolved));
                cursor = close;
            }
            None => {
                out.push_str(&text[cursor ..]);
                break;
            }
        }
    }
    Value::String(out)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Resolves one `path (| default: literal)?` expression.
fn resolve_expression(expr: &str, ctx: &TemplateContext<'_>, unresolved: &mut Vec<String>) -> Value {
    let (path, default_literal) = match expr.split_once('|') {
        Some((path, rest)) => (path.trim(), rest.trim().strip_prefix("default:").map(str::trim)),
        None => (expr.trim(), None),
    };

    match resolve_path(path, ctx) {
        Some(value) => value,
        None => {
            unresolved.push(path.to_string());
            match default_literal {
                Some(literal) => parse_default_literal(literal),
                None => Value::Null,
            }
        }
    }
}

/// Parses a default literal: quoted string, `true`/`false`/`null`, a finite
/// number, or otherwise the raw text.
fn parse_default_literal(literal: &str) -> Value {
    if let Some(stripped) = literal.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Value::String(stripped.to_string());
    }
    if let Some(stripped) = literal.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return Value::String(stripped.to_string());
    }
    match literal {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(parsed) = literal.parse::<f64>() {
        if parsed.is_finite() {
            if let Some(number) = serde_json::Number::from_f64(parsed) {
                return Value::Number(number);
            }
        }
    }
    Value::String(literal.to_string())
}

/// Routes a path by its prefix; unprefixed paths try `alert.` then `context.`.
fn resolve_path(path: &str, ctx: &TemplateContext<'_>) -> Option<Value> {
    if let Some(rest) = path.strip_prefix("alert.") {
        return ctx.alert.and_then(|alert| resolve_field_path(alert, rest)).cloned();
    }
    if let Some(rest) = path.strip_prefix("steps.") {
        return resolve_field_path(ctx.steps, rest).cloned();
    }
    if let Some(rest) = path.strip_prefix("context.") {
        return resolve_field_path(ctx.context, rest).cloned();
    }
    if let Some(rest) = path.strip_prefix("env.") {
        return resolve_field_path(ctx.env, rest).cloned();
    }

    if let Some(alert) = ctx.alert {
        if let Some(found) = resolve_field_path(alert, path) {
            return Some(found.clone());
        }
    }
    resolve_field_path(ctx.context, path).cloned()
}

// ============================================================================
// SECTION: Condition Guard Evaluation
// ============================================================================

/// Evaluates a resolved condition string as a guard.
///
/// Exactly `N op M` with `op ∈ {>,<,>=,<=,==,!=}` and decimal operands
/// evaluates numerically. `"true"`/`"false"` map directly. Any other
/// non-empty string is truthy (fail-open); an empty string is falsy.
#[must_use]
pub fn evaluate_condition(resolved: &str) -> bool {
    let trimmed = resolved.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed == "true" {
        return true;
    }
    if trimmed == "false" {
        return false;
    }
    if let Some(result) = evaluate_numeric_comparison(trimmed) {
        return result;
    }
    true
}

fn evaluate_numeric_comparison(expr: &str) -> Option<bool> {
    const OPS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];
    for op in OPS {
        if let Some((left, right)) = expr.split_once(op) {
            let left: f64 = left.trim().parse().ok()?;
            let right: f64 = right.trim().parse().ok()?;
            return Some(match op {
                ">=" => left >= right,
                "<=" => left <= right,
                "==" => (left - right).abs() < f64::EPSILON,
                "!=" => (left - right).abs() >= f64::EPSILON,
                ">" => left > right,
                "<" => left < right,
                _ => unreachable!("OPS is exhaustively matched above"),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn empty_context<'a>(alert: &'a Value, steps: &'a Value) -> TemplateContext<'a> {
        TemplateContext { alert: Some(alert), steps, context: steps, env: steps }
    }

    #[test]
    fn whole_expression_preserves_native_type() {
        let alert = json!({"x": 42});
        let steps = json!({});
        let ctx = empty_context(&alert, &steps);
        let resolved = resolve(&json!("{{ alert.x }}"), &ctx);
        assert_eq!(resolved.value, json!(42));
        assert!(resolved.unresolved_paths.is_empty());
    }

    #[test]
    fn mixed_expression_stringifies() {
        let alert = json!({"x": 42});
        let steps = json!({});
        let ctx = empty_context(&alert, &steps);
        let resolved = resolve(&json!("value is {{ alert.x }}!"), &ctx);
        assert_eq!(resolved.value, json!("value is 42!"));
    }

    #[test]
    fn unresolved_path_reports_and_uses_default() {
        let alert = json!({});
        let steps = json!({});
        let ctx = empty_context(&alert, &steps);
        let resolved = resolve(&json!("{{ alert.missing | default: 'fallback' }}"), &ctx);
        assert_eq!(resolved.value, json!("fallback"));
        assert_eq!(resolved.unresolved_paths, vec!["alert.missing".to_string()]);
    }

    #[test]
    fn unprefixed_path_falls_back_to_alert_then_context() {
        let alert = json!({"shared": "from-alert"});
        let steps = json!({});
        let mut ctx = empty_context(&alert, &steps);
        let context_only = json!({"shared": "from-context"});
        ctx.context = &context_only;
        assert_eq!(resolve(&json!("{{ shared }}"), &ctx).value, json!("from-alert"));
    }

    #[test]
    fn numeric_condition_guard_evaluates_gt() {
        assert!(evaluate_condition("85 > 50"));
        assert!(!evaluate_condition("10 > 50"));
    }

    #[test]
    fn non_numeric_non_boolean_string_is_truthy() {
        assert!(evaluate_condition("anything"));
    }

    #[test]
    fn empty_string_is_falsy() {
        assert!(!evaluate_condition(""));
    }

    #[test]
    fn array_indexed_step_output_resolves() {
        let alert = json!({});
        let steps = json!({"step-01": {"output": {"risk_score": 85}}});
        let ctx = empty_context(&alert, &steps);
        let resolved = resolve(&json!("{{ steps.step-01.output.risk_score }}"), &ctx);
        assert_eq!(resolved.value, json!(85));
    }
}
