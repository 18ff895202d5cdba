// runbookpilot-config/src/schema.rs
// ============================================================================
// Module: Runbook Schema
// Description: JSON Schema builder for the runbook document shape.
// Purpose: Give operators and tooling a machine-checkable description of a
//          valid runbook, and a friendlier first validation pass than a raw
//          serde deserialization error.
// Dependencies: jsonschema, serde_json
// ============================================================================

//! ## Overview
//! This schema is generated from the same shape `runbookpilot_core::Runbook`
//! deserializes into; it is deliberately stricter than serde alone
//! (`additionalProperties: false`, enum closure) so a malformed runbook is
//! rejected with a field-addressed error before it ever reaches
//! `Runbook::validate`'s structural checks (cycle detection, dangling
//! dependencies).

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use serde_json::json;

/// Errors raised while validating a runbook document against [`runbook_schema`].
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema itself failed to compile (a bug in this module).
    #[error("runbook schema failed to compile: {0}")]
    Invalid(String),
    /// The document violated the schema; message is the first violation found.
    #[error("runbook document violates schema: {0}")]
    Violation(String),
}

/// Returns the JSON Schema for a runbook document.
#[must_use]
pub fn runbook_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runbookpilot://schemas/runbook.schema.json",
        "title": "RunbookPilot Runbook",
        "description": "A declarative step graph bound to actions and executors.",
        "type": "object",
        "required": ["id", "version", "name", "config", "steps"],
        "properties": {
            "id": schema_for_non_empty_string("Runbook identifier, unique within a deployment."),
            "version": schema_for_non_empty_string("Semantic version string."),
            "name": schema_for_non_empty_string("Human-readable display name."),
            "metadata": {
                "type": "object",
                "default": {},
                "description": "Free-form metadata (owner, description, tags)."
            },
            "triggers": {
                "type": "array",
                "items": trigger_filter_schema(),
                "default": [],
                "description": "Filters deciding which alerts activate this runbook."
            },
            "config": runbook_config_schema(),
            "steps": {
                "type": "array",
                "items": runbook_step_schema(),
                "minItems": 1,
                "description": "The step graph; must be non-empty."
            }
        },
        "additionalProperties": false
    })
}

/// Schema for the `config` object.
fn runbook_config_schema() -> Value {
    json!({
        "type": "object",
        "required": ["automation_level", "max_execution_time"],
        "properties": {
            "automation_level": {
                "type": "string",
                "enum": ["L0", "L1", "L2"],
                "description": "Automation tier this runbook executes under."
            },
            "max_execution_time": {
                "type": "integer",
                "minimum": 1,
                "description": "Overall execution timeout in seconds."
            },
            "requires_approval": {
                "type": "boolean",
                "default": false,
                "description": "L2-only: gate simulation behind explicit confirmation."
            },
            "rollback_on_failure": {
                "type": "boolean",
                "default": true,
                "description": "Whether a failed execution triggers the rollback engine."
            }
        },
        "additionalProperties": false
    })
}

/// Schema for one `triggers[]` entry.
fn trigger_filter_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "detection_sources": schema_for_string_array("Detection sources this runbook responds to."),
            "mitre_techniques": schema_for_string_array("MITRE ATT&CK technique ids this runbook responds to."),
            "platforms": schema_for_string_array("Platforms this runbook responds to."),
            "severity": schema_for_string_array("Severity labels this runbook responds to."),
            "expression": {
                "oneOf": [{ "type": "null" }, { "type": "object" }],
                "default": null,
                "description": "Optional additional expression tree evaluated against the alert."
            }
        },
        "additionalProperties": false
    })
}

/// Schema for one `steps[]` entry.
fn runbook_step_schema() -> Value {
    json!({
        "type": "object",
        "required": ["id", "name", "action", "executor", "on_error", "timeout"],
        "properties": {
            "id": schema_for_non_empty_string("Identifier unique within the owning runbook."),
            "name": schema_for_non_empty_string("Human-readable step name."),
            "action": schema_for_non_empty_string("Action name dispatched to the executor."),
            "executor": schema_for_non_empty_string("Executor (adapter) this step dispatches through."),
            "parameters": {
                "type": "object",
                "default": {},
                "description": "Parameters, resolved through templating before dispatch."
            },
            "depends_on": schema_for_string_array("Ids of steps that must complete before this one runs."),
            "condition": {
                "oneOf": [{ "type": "null" }, { "type": "string" }],
                "default": null,
                "description": "Templated guard expression."
            },
            "on_error": {
                "type": "string",
                "enum": ["halt", "continue", "skip"],
                "description": "Policy applied when this step's dispatch fails."
            },
            "timeout": {
                "type": "integer",
                "minimum": 1,
                "description": "Per-step dispatch timeout in seconds."
            },
            "approval_required": {
                "oneOf": [{ "type": "null" }, { "type": "boolean" }],
                "default": null,
                "description": "Overrides the L1 default of \"writes require approval\" when set."
            },
            "rollback": {
                "oneOf": [{ "type": "null" }, rollback_spec_schema()],
                "default": null,
                "description": "Compensating action run during rollback."
            }
        },
        "additionalProperties": false
    })
}

/// Schema for a step's `rollback` object.
fn rollback_spec_schema() -> Value {
    json!({
        "type": "object",
        "required": ["action", "timeout"],
        "properties": {
            "action": schema_for_non_empty_string("Action name to dispatch during rollback."),
            "executor": {
                "oneOf": [{ "type": "null" }, schema_for_non_empty_string("Executor to dispatch through.")],
                "default": null,
                "description": "Defaults to the owning step's executor when omitted."
            },
            "parameters": {
                "type": "object",
                "default": {},
                "description": "Parameters for the rollback dispatch."
            },
            "timeout": {
                "type": "integer",
                "minimum": 1,
                "description": "Timeout in seconds for the rollback dispatch."
            }
        },
        "additionalProperties": false
    })
}

/// Schema for a required, non-empty string.
fn schema_for_non_empty_string(description: &str) -> Value {
    json!({
        "type": "string",
        "minLength": 1,
        "description": description
    })
}

/// Schema for a string array (empty allowed).
fn schema_for_string_array(description: &str) -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "default": [],
        "description": description
    })
}

/// Compiles [`runbook_schema`] and validates `document` against it.
///
/// # Errors
/// Returns [`SchemaError::Invalid`] if the schema itself fails to compile
/// (a defect in this module), or [`SchemaError::Violation`] describing the
/// first schema violation found in `document`.
pub fn validate_runbook_schema(document: &Value) -> Result<(), SchemaError> {
    let validator = compile_schema(&runbook_schema())?;
    if let Some(error) = validator.iter_errors(document).next() {
        return Err(SchemaError::Violation(error.to_string()));
    }
    Ok(())
}

/// Compiles a JSON Schema document into a reusable [`Validator`].
fn compile_schema(schema: &Value) -> Result<Validator, SchemaError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| SchemaError::Invalid(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_document() -> Value {
        json!({
            "id": "rb-1",
            "version": "1.0.0",
            "name": "Contain compromised host",
            "triggers": [],
            "config": {
                "automation_level": "L1",
                "max_execution_time": 600,
                "requires_approval": false,
                "rollback_on_failure": true
            },
            "steps": [{
                "id": "isolate",
                "name": "Isolate host",
                "action": "isolate_host",
                "executor": "edr",
                "parameters": { "host_id": "{{ alert.host.id }}" },
                "depends_on": [],
                "condition": null,
                "on_error": "halt",
                "timeout": 30,
                "approval_required": null,
                "rollback": null
            }]
        })
    }

    #[test]
    fn schema_compiles() {
        assert!(compile_schema(&runbook_schema()).is_ok());
    }

    #[test]
    fn accepts_a_well_formed_document() {
        assert!(validate_runbook_schema(&valid_document()).is_ok());
    }

    #[test]
    fn rejects_an_unknown_automation_level() {
        let mut document = valid_document();
        document["config"]["automation_level"] = json!("L3");
        assert!(matches!(validate_runbook_schema(&document), Err(SchemaError::Violation(_))));
    }

    #[test]
    fn rejects_an_unexpected_top_level_field() {
        let mut document = valid_document();
        document["unexpected"] = json!(true);
        assert!(matches!(validate_runbook_schema(&document), Err(SchemaError::Violation(_))));
    }

    #[test]
    fn rejects_a_missing_required_field() {
        let mut document = valid_document();
        document.as_object_mut().unwrap_or_else(|| unreachable!("object")).remove("config");
        assert!(matches!(validate_runbook_schema(&document), Err(SchemaError::Violation(_))));
    }
}
