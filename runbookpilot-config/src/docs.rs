// runbookpilot-config/src/docs.rs
// ============================================================================
// Module: Runbook Docs Generator
// Description: Markdown field reference generated from the runbook schema.
// Purpose: Keep the operator-facing runbook authoring reference in sync with
//          the schema actually enforced at load time.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Renders one Markdown table per object level of [`crate::schema::runbook_schema`]
//! (top level, `config`, one step, and a step's `rollback`). Output is
//! deterministic so it can be checked into a repository and diffed in review.

use std::fmt::Write as _;

use serde_json::Value;

use crate::schema::runbook_schema;

/// Stand-in for a missing schema node so pointer lookups can return a borrow.
const NULL: Value = Value::Null;

/// Generates the runbook field reference as a Markdown document.
#[must_use]
pub fn runbook_docs_markdown() -> String {
    let schema = runbook_schema();
    let mut out = String::new();

    out.push_str("# Runbook Document Reference\n\n");
    out.push_str(
        "A runbook is a YAML document describing a step graph bound to actions and \
         executors. Fields below match what `runbookpilot-config` accepts; unknown \
         top-level or nested fields are rejected.\n\n",
    );

    render_section(&mut out, "Top Level", &schema);
    render_section(&mut out, "`config`", property(&schema, "config"));
    render_section(&mut out, "`steps[]`", array_items(&schema, "steps"));
    render_section(
        &mut out,
        "`steps[].rollback`",
        one_of_object(property(array_items(&schema, "steps"), "rollback")),
    );

    out
}

/// Looks up `schema.properties.<name>`, or [`NULL`] if absent.
fn property<'a>(schema: &'a Value, name: &str) -> &'a Value {
    schema.pointer(&format!("/properties/{name}")).unwrap_or(&NULL)
}

/// Looks up `schema.properties.<name>.items`, or [`NULL`] if absent.
fn array_items<'a>(schema: &'a Value, name: &str) -> &'a Value {
    property(schema, name).pointer("/items").unwrap_or(&NULL)
}

/// Picks the object-typed branch out of a nullable `oneOf` schema.
fn one_of_object(schema: &Value) -> &Value {
    schema
        .pointer("/oneOf")
        .and_then(Value::as_array)
        .and_then(|variants| variants.iter().find(|variant| variant["type"] == "object"))
        .unwrap_or(&NULL)
}

/// Appends one Markdown table documenting `schema`'s direct properties.
fn render_section(out: &mut String, heading: &str, schema: &Value) {
    let _ = writeln!(out, "## {heading}\n");
    let _ = writeln!(out, "| Field | Type | Required | Default | Description |");
    let _ = writeln!(out, "|---|---|---|---|---|");

    let Some(properties) = schema.pointer("/properties").and_then(Value::as_object) else {
        return;
    };
    let required: Vec<&str> =
        schema.pointer("/required").and_then(Value::as_array).map_or_else(Vec::new, |values| {
            values.iter().filter_map(Value::as_str).collect()
        });

    for (field, field_schema) in properties {
        let ty = field_type(field_schema);
        let is_required = if required.contains(&field.as_str()) { "yes" } else { "no" };
        let default = field_schema
            .get("default")
            .map_or_else(|| "-".to_string(), |value| value.to_string());
        let description = field_schema.get("description").and_then(Value::as_str).unwrap_or("-");
        let _ = writeln!(out, "| `{field}` | {ty} | {is_required} | {default} | {description} |");
    }
    out.push('\n');
}

/// Renders a display label for a field's `type`/`enum`/`oneOf` schema node.
fn field_type(schema: &Value) -> String {
    if let Some(ty) = schema.get("type").and_then(Value::as_str) {
        return ty.to_string();
    }
    if let Some(enum_values) = schema.get("enum").and_then(Value::as_array) {
        let values: Vec<String> = enum_values.iter().map(Value::to_string).collect();
        return format!("enum({})", values.join(", "));
    }
    if schema.get("oneOf").is_some() {
        return "nullable".to_string();
    }
    "object".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_declared_section() {
        let markdown = runbook_docs_markdown();
        assert!(markdown.contains("## Top Level"));
        assert!(markdown.contains("## `config`"));
        assert!(markdown.contains("## `steps[]`"));
        assert!(markdown.contains("## `steps[].rollback`"));
    }

    #[test]
    fn documents_automation_level_as_an_enum() {
        let markdown = runbook_docs_markdown();
        assert!(markdown.contains("enum("));
        assert!(markdown.contains("automation_level"));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(runbook_docs_markdown(), runbook_docs_markdown());
    }
}
