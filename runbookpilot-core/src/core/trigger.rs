// runbookpilot-core/src/core/trigger.rs
// ============================================================================
// Module: Trigger Expression Tree
// Description: Declarative expression tree used as the optional extra clause
//              of a runbook trigger filter.
// Purpose: Define the serializable shape; evaluation lives in
//          `runtime::trigger_eval` where it is bridged onto the universal
//          requirement algebra.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A `TriggerExpr` is either a leaf comparison against a field path, or a
//! combinator (`and`/`or`/`not`) over child expressions. This module only
//! carries the shape; `runtime::trigger_eval` wraps each leaf as a predicate
//! and hands the tree to [`runbookpilot_logic::Requirement`] for evaluation.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Comparison operators available to a trigger expression leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOp {
    /// Equal to.
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than (numeric).
    Gt,
    /// Less than (numeric).
    Lt,
    /// Greater than or equal to (numeric).
    Gte,
    /// Less than or equal to (numeric).
    Lte,
    /// Field value is contained in the supplied set.
    In,
    /// Field value (string or array) contains the supplied value.
    Contains,
    /// Field value matches the supplied regular expression.
    Matches,
    /// Field is present (or, with `value: false`, absent).
    Exists,
}

/// One leaf condition: `field <op> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCondition {
    /// Dot-notation field path into the alert document.
    pub field: String,
    /// Operator applied to the resolved field value.
    pub op: TriggerOp,
    /// Operand compared against the field value. Unused for `exists` unless
    /// explicitly `false`, which inverts the presence check.
    #[serde(default)]
    pub value: Value,
}

/// A trigger expression tree: a leaf condition or a logical combinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerExpr {
    /// A single field comparison.
    Condition(TriggerCondition),
    /// All children must match.
    And(Vec<TriggerExpr>),
    /// At least one child must match.
    Or(Vec<TriggerExpr>),
    /// The child must not match.
    Not(Box<TriggerExpr>),
}
