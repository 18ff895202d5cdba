// runbookpilot-logic/tests/requirement.rs
// ============================================================================
// Module: Requirement Integration Tests
// Description: End-to-end coverage of the universal requirement algebra.
// ============================================================================
//! ## Overview
//! Exercises `Requirement<P>` against a minimal evidence-backed predicate to
//! confirm boolean short-circuiting and tri-state (Kleene/Bochvar) semantics.

#[path = "support/mod.rs"]
mod support;

use runbookpilot_logic::BochvarLogic;
use runbookpilot_logic::KleeneLogic;
use runbookpilot_logic::PredicateEval;
use runbookpilot_logic::Requirement;
use runbookpilot_logic::TriState;
use runbookpilot_logic::TriStatePredicateEval;
use support::TestResult;
use support::ensure;

// ============================================================================
// SECTION: Fixture Predicate
// ============================================================================

/// Evidence reader backing the fixture predicate: a row is a named slot whose
/// value may be absent (unknown evidence).
struct EvidenceReader<'a> {
    slots: &'a [Option<bool>],
}

/// A fixture predicate referencing a slot by index within an `EvidenceReader`.
#[derive(Debug, Clone, Copy)]
struct SlotPredicate(usize);

impl PredicateEval for SlotPredicate {
    type Reader<'a> = EvidenceReader<'a>;

    fn eval_row(&self, reader: &Self::Reader<'_>, _row: usize) -> bool {
        reader.slots[self.0].unwrap_or(false)
    }
}

impl TriStatePredicateEval for SlotPredicate {
    type Reader<'a> = EvidenceReader<'a>;

    fn eval_row_tristate(&self, reader: &Self::Reader<'_>, _row: usize) -> TriState {
        match reader.slots[self.0] {
            Some(value) => value.into(),
            None => TriState::Unknown,
        }
    }
}

fn req(idx: usize) -> Requirement<SlotPredicate> {
    Requirement::predicate(SlotPredicate(idx))
}

// ============================================================================
// SECTION: Boolean Evaluation
// ============================================================================

#[test]
fn and_short_circuits_on_first_failure() -> TestResult {
    let reader = EvidenceReader { slots: &[Some(true), Some(false), Some(true)] };
    let tree = Requirement::and(vec![req(0), req(1), req(2)]);

    ensure(!tree.eval(&reader, 0), "AND with a false member must evaluate to false")
}

#[test]
fn and_is_true_when_all_members_pass() -> TestResult {
    let reader = EvidenceReader { slots: &[Some(true), Some(true)] };
    let tree = Requirement::and(vec![req(0), req(1)]);

    ensure(tree.eval(&reader, 0), "AND with all true members must evaluate to true")
}

#[test]
fn empty_and_is_trivially_satisfied() -> TestResult {
    let tree: Requirement<SlotPredicate> = Requirement::and(vec![]);
    ensure(tree.is_trivially_satisfied(), "empty AND must be trivially satisfied")
}

#[test]
fn or_short_circuits_on_first_success() -> TestResult {
    let reader = EvidenceReader { slots: &[Some(false), Some(true), Some(false)] };
    let tree = Requirement::or(vec![req(0), req(1), req(2)]);

    ensure(tree.eval(&reader, 0), "OR with one true member must evaluate to true")
}

#[test]
fn empty_or_is_trivially_unsatisfiable() -> TestResult {
    let tree: Requirement<SlotPredicate> = Requirement::or(vec![]);
    ensure(tree.is_trivially_unsatisfiable(), "empty OR must be trivially unsatisfiable")
}

#[test]
fn not_inverts_the_inner_result() -> TestResult {
    let reader = EvidenceReader { slots: &[Some(false)] };
    let tree = Requirement::negate(req(0));

    ensure(tree.eval(&reader, 0), "NOT(false) must evaluate to true")
}

#[test]
fn require_group_passes_with_enough_satisfied() -> TestResult {
    let reader = EvidenceReader { slots: &[Some(true), Some(false), Some(true), Some(false)] };
    let tree = Requirement::require_group(2, vec![req(0), req(1), req(2), req(3)]);

    ensure(tree.eval(&reader, 0), "require_group(2) with two true members must pass")
}

#[test]
fn require_group_fails_when_impossible() -> TestResult {
    let reader = EvidenceReader { slots: &[Some(true), Some(false), Some(false)] };
    let tree = Requirement::require_group(2, vec![req(0), req(1), req(2)]);

    ensure(!tree.eval(&reader, 0), "require_group(2) with only one possible true must fail")
}

// ============================================================================
// SECTION: Tri-State Evaluation (Kleene)
// ============================================================================

#[test]
fn kleene_and_with_unknown_and_true_is_unknown() -> TestResult {
    let reader = EvidenceReader { slots: &[None, Some(true)] };
    let tree = Requirement::and(vec![req(0), req(1)]);

    ensure(
        tree.eval_tristate(&reader, 0, &KleeneLogic).is_unknown(),
        "Kleene AND(unknown, true) must be unknown",
    )
}

#[test]
fn kleene_and_with_unknown_and_false_is_false() -> TestResult {
    let reader = EvidenceReader { slots: &[None, Some(false)] };
    let tree = Requirement::and(vec![req(0), req(1)]);

    ensure(
        tree.eval_tristate(&reader, 0, &KleeneLogic).is_false(),
        "Kleene AND(unknown, false) must be false regardless of the unknown operand",
    )
}

#[test]
fn kleene_or_with_unknown_and_true_is_true() -> TestResult {
    let reader = EvidenceReader { slots: &[None, Some(true)] };
    let tree = Requirement::or(vec![req(0), req(1)]);

    ensure(
        tree.eval_tristate(&reader, 0, &KleeneLogic).is_true(),
        "Kleene OR(unknown, true) must be true regardless of the unknown operand",
    )
}

#[test]
fn kleene_not_preserves_unknown() -> TestResult {
    let reader = EvidenceReader { slots: &[None] };
    let tree = Requirement::negate(req(0));

    ensure(
        tree.eval_tristate(&reader, 0, &KleeneLogic).is_unknown(),
        "Kleene NOT(unknown) must remain unknown",
    )
}

// ============================================================================
// SECTION: Tri-State Evaluation (Bochvar)
// ============================================================================

#[test]
fn bochvar_and_with_unknown_and_false_is_unknown() -> TestResult {
    let reader = EvidenceReader { slots: &[None, Some(false)] };
    let tree = Requirement::and(vec![req(0), req(1)]);

    ensure(
        tree.eval_tristate(&reader, 0, &BochvarLogic).is_unknown(),
        "Bochvar AND is infectious: unknown poisons the result even alongside false",
    )
}

#[test]
fn bochvar_or_with_unknown_and_true_is_unknown() -> TestResult {
    let reader = EvidenceReader { slots: &[None, Some(true)] };
    let tree = Requirement::or(vec![req(0), req(1)]);

    ensure(
        tree.eval_tristate(&reader, 0, &BochvarLogic).is_unknown(),
        "Bochvar OR is infectious: unknown poisons the result even alongside true",
    )
}

// ============================================================================
// SECTION: Require-Group Tri-State Semantics
// ============================================================================

#[test]
fn require_group_tristate_true_when_already_satisfied() -> TestResult {
    let reader = EvidenceReader { slots: &[Some(true), Some(true), None] };
    let tree = Requirement::require_group(2, vec![req(0), req(1), req(2)]);

    ensure(
        tree.eval_tristate(&reader, 0, &KleeneLogic).is_true(),
        "require_group(2) must be true once enough members are definitively satisfied, \
         independent of the remaining unknown member",
    )
}

#[test]
fn require_group_tristate_false_when_impossible_even_with_unknowns() -> TestResult {
    let reader = EvidenceReader { slots: &[Some(false), Some(false), None] };
    let tree = Requirement::require_group(2, vec![req(0), req(1), req(2)]);

    ensure(
        tree.eval_tristate(&reader, 0, &KleeneLogic).is_false(),
        "require_group(2) must be false when fewer than min members can possibly pass",
    )
}

#[test]
fn require_group_tristate_unknown_when_outcome_still_depends_on_evidence() -> TestResult {
    let reader = EvidenceReader { slots: &[Some(true), None, None] };
    let tree = Requirement::require_group(2, vec![req(0), req(1), req(2)]);

    ensure(
        tree.eval_tristate(&reader, 0, &KleeneLogic).is_unknown(),
        "require_group(2) must stay unknown while either remaining unknown member could \
         still make or break satisfaction",
    )
}

#[test]
fn require_group_zero_min_is_trivially_true() -> TestResult {
    let reader = EvidenceReader { slots: &[None, None] };
    let tree = Requirement::require_group(0, vec![req(0), req(1)]);

    ensure(
        tree.eval_tristate(&reader, 0, &KleeneLogic).is_true(),
        "require_group(0) must be true regardless of evidence",
    )
}

// ============================================================================
// SECTION: Structural Helpers
// ============================================================================

#[test]
fn complexity_counts_every_node_in_the_tree() -> TestResult {
    let tree = Requirement::and(vec![req(0), Requirement::negate(req(1))]);

    // one And node + one Predicate leaf + one Not node + one Predicate leaf
    ensure(tree.complexity() == 4, "complexity must count every node, leaves and combinators alike")
}
