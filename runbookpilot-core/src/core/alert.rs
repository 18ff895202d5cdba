// runbookpilot-core/src/core/alert.rs
// ============================================================================
// Module: Alert Record
// Description: ECS-shaped alert record consumed by the trigger evaluator,
//              enrichment pipeline, and templating context.
// Purpose: Provide a single field-path accessor over an opaque alert document.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Alerts are ECS-shaped: `@timestamp` and `event.kind` are the only fields
//! the engine interprets directly. Everything else (`host`, `source`,
//! `destination`, `process`, `user`, `file`, `threat`, `tags`,
//! `x-detectforge` metadata) is opaque and reached only through the dotted
//! field-path accessor shared by templating and the trigger evaluator.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// An ECS-shaped security alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// The full alert document, stored as-is so unknown fields survive round-trips.
    #[serde(flatten)]
    pub document: serde_json::Map<String, Value>,
}

impl Alert {
    /// Wraps a raw JSON object as an alert.
    #[must_use]
    pub fn new(document: serde_json::Map<String, Value>) -> Self {
        Self { document }
    }

    /// Looks up `event.kind`, defaulting to an empty string when absent.
    #[must_use]
    pub fn event_kind(&self) -> &str {
        self.field_path("event.kind").and_then(Value::as_str).unwrap_or_default()
    }

    /// Resolves a dot-notation, optionally index-bracketed field path against
    /// this alert's document (e.g. `threat.technique.id` or `tags[0]`).
    #[must_use]
    pub fn field_path(&self, path: &str) -> Option<&Value> {
        resolve_field_path(&Value::Object(self.document.clone()), path)
    }
}

/// Resolves a dot-notation path with optional `name[index]` segments against a
/// JSON value. Shared by the alert accessor, templating, and the trigger
/// expression evaluator so all three agree on traversal semantics.
#[must_use]
pub fn resolve_field_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for raw_segment in path.split('.') {
        if raw_segment.is_empty() {
            return None;
        }
        let (name, index) = split_index(raw_segment);
        current = current.as_object()?.get(name)?;
        if let Some(index) = index {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

/// Splits `name[3]` into `("name", Some(3))`, or `name` into `("name", None)`.
fn split_index(segment: &str) -> (&str, Option<usize>) {
    if let Some(open) = segment.find('[') {
        if segment.ends_with(']') {
            let name = &segment[..open];
            let digits = &segment[open + 1..segment.len() - 1];
            if let Ok(index) = digits.parse::<usize>() {
                return (name, Some(index));
            }
        }
    }
    (segment, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_alert() -> Alert {
        let json = serde_json::json!({
            "@timestamp": "2026-07-28T00:00:00Z",
            "event": {"kind": "alert"},
            "threat": {"technique": {"id": ["T1059.001"]}},
            "tags": ["high", "lateral-movement"],
        });
        let Some(object) = json.as_object() else { unreachable!("json! object literal above") };
        Alert::new(object.clone())
    }

    #[test]
    fn event_kind_reads_nested_field() {
        assert_eq!(sample_alert().event_kind(), "alert");
    }

    #[test]
    fn field_path_indexes_arrays() {
        let alert = sample_alert();
        assert_eq!(alert.field_path("tags[1]").and_then(Value::as_str), Some("lateral-movement"));
    }

    #[test]
    fn field_path_traverses_nested_arrays() {
        let alert = sample_alert();
        assert_eq!(
            alert.field_path("threat.technique.id[0]").and_then(Value::as_str),
            Some("T1059.001")
        );
    }

    #[test]
    fn missing_path_resolves_to_none() {
        let alert = sample_alert();
        assert_eq!(alert.field_path("host.name"), None);
    }
}
