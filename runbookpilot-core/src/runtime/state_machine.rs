// runbookpilot-core/src/runtime/state_machine.rs
// ============================================================================
// Module: Execution State Machine
// Description: Constant transition table over ExecutionState plus a
//              per-execution transition history and listener hook.
// Purpose: Be the single authority deciding which ExecutionState transitions
//          are legal; the orchestrator never mutates ExecutionContext.state
//          directly.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Every transition is timestamped and appended to this machine's history.
//! Optional listeners are notified synchronously, in registration order,
//! after the transition is recorded — a panicking listener is caught so it
//! cannot unwind through the scheduler loop driving the execution.

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;

use crate::core::ExecutionId;
use crate::core::ExecutionState;
use crate::core::Timestamp;

/// One recorded transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransitionEvent {
    /// Execution this transition belongs to.
    pub execution_id: ExecutionId,
    /// State before the transition.
    pub from: ExecutionState,
    /// State after the transition.
    pub to: ExecutionState,
    /// Name of the event that drove the transition (e.g. `"validation_passed"`).
    pub event: &'static str,
    /// When the transition was recorded.
    pub at: Timestamp,
}

/// Errors raised when an event is not legal from the machine's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// The current state is terminal; no event is legal.
    #[error("execution is already in a terminal state")]
    Terminal,
    /// The event is not a legal transition from the current state.
    #[error("event is not a legal transition from the current state")]
    IllegalTransition,
}

/// A named transition event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// `idle -> validating`.
    Validate,
    /// `validating -> planning`.
    ValidationPassed,
    /// `validating -> failed`.
    ValidationFailed,
    /// `planning -> executing`.
    PlanReady,
    /// `planning -> awaiting_approval`.
    ApprovalRequired,
    /// `awaiting_approval -> executing`.
    Approved,
    /// `executing -> executing` (one more step dispatched, none terminal yet).
    StepCompleted,
    /// `executing -> completed`.
    AllStepsCompleted,
    /// `executing -> failed`.
    StepFailed,
    /// `executing -> rolling_back`.
    StartRollback,
    /// `rolling_back -> completed`.
    RollbackCompleted,
    /// `rolling_back -> failed`.
    RollbackFailed,
    /// Any non-terminal, non-executing state `-> cancelled`; `executing ->
    /// cancelled` is also legal, driven by the execution controller.
    Cancel,
}

impl Event {
    const fn name(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::ValidationPassed => "validation_passed",
            Self::ValidationFailed => "validation_failed",
            Self::PlanReady => "plan_ready",
            Self::ApprovalRequired => "approval_required",
            Self::Approved => "approved",
            Self::StepCompleted => "step_completed",
            Self::AllStepsCompleted => "all_steps_completed",
            Self::StepFailed => "step_failed",
            Self::StartRollback => "start_rollback",
            Self::RollbackCompleted => "rollback_completed",
            Self::RollbackFailed => "rollback_failed",
            Self::Cancel => "cancel",
        }
    }
}

/// Applies the constant transition table: `(state, event) -> next state`, or
/// `None` when the event is not legal from that state.
const fn transition(state: ExecutionState, event: Event) -> Option<ExecutionState> {
    use Event::{
        Approved, Cancel, PlanReady, RollbackCompleted, RollbackFailed, StartRollback,
        StepCompleted, StepFailed, Validate, ValidationFailed, ValidationPassed,
    };
    use ExecutionState::{
        AwaitingApproval, Cancelled, Completed, Executing, Failed, Idle, Planning, RollingBack,
        Validating,
    };

    match (state, event) {
        (Idle, Validate) => Some(Validating),
        (Validating, ValidationPassed) => Some(Planning),
        (Validating, ValidationFailed) => Some(Failed),
        (Planning, PlanReady) => Some(Executing),
        (Planning, Event::ApprovalRequired) => Some(AwaitingApproval),
        (AwaitingApproval, Approved) => Some(Executing),
        (Executing, StepCompleted) => Some(Executing),
        (Executing, Event::AllStepsCompleted) => Some(Completed),
        (Executing, StepFailed) => Some(Failed),
        (Executing, StartRollback) => Some(RollingBack),
        (RollingBack, RollbackCompleted) => Some(Completed),
        (RollingBack, RollbackFailed) => Some(Failed),
        (Idle | Validating | Planning | AwaitingApproval | Executing, Cancel) => Some(Cancelled),
        _ => None,
    }
}

/// A listener notified after every successful transition.
pub trait StateChangeListener: Send + Sync {
    /// Called synchronously, after the transition is recorded in history.
    fn on_transition(&self, event: &StateTransitionEvent);
}

/// Drives one execution's state, recording every transition.
pub struct StateMachine {
    execution_id: ExecutionId,
    state: ExecutionState,
    history: Vec<StateTransitionEvent>,
    listeners: Vec<Box<dyn StateChangeListener>>,
}

/// A restorable snapshot of a [`StateMachine`]'s state and history.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachineSnapshot {
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// Current state at snapshot time.
    pub state: ExecutionState,
    /// Full transition history at snapshot time.
    pub history: Vec<StateTransitionEvent>,
}

impl StateMachine {
    /// Creates a fresh machine in [`ExecutionState::Idle`].
    #[must_use]
    pub fn new(execution_id: ExecutionId) -> Self {
        Self { execution_id, state: ExecutionState::Idle, history: Vec::new(), listeners: Vec::new() }
    }

    /// Restores a machine from a previously captured snapshot.
    #[must_use]
    pub fn restore(snapshot: StateMachineSnapshot) -> Self {
        Self {
            execution_id: snapshot.execution_id,
            state: snapshot.state,
            history: snapshot.history,
            listeners: Vec::new(),
        }
    }

    /// Captures the current state and history for later restoration.
    #[must_use]
    pub fn snapshot(&self) -> StateMachineSnapshot {
        StateMachineSnapshot {
            execution_id: self.execution_id.clone(),
            state: self.state,
            history: self.history.clone(),
        }
    }

    /// Registers a listener, notified on every subsequent transition.
    pub fn add_listener(&mut self, listener: Box<dyn StateChangeListener>) {
        self.listeners.push(listener);
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> ExecutionState {
        self.state
    }

    /// The full transition history recorded so far.
    #[must_use]
    pub fn history(&self) -> &[StateTransitionEvent] {
        &self.history
    }

    /// Applies `event`, returning the new state or an error if illegal.
    ///
    /// # Errors
    /// Returns [`StateMachineError::Terminal`] when the current state has no
    /// legal outgoing transitions, or [`StateMachineError::IllegalTransition`]
    /// when `event` is not legal from the current (non-terminal) state.
    pub fn apply(&mut self, event: Event) -> Result<ExecutionState, StateMachineError> {
        if self.state.is_terminal() {
            return Err(StateMachineError::Terminal);
        }
        let Some(next) = transition(self.state, event) else {
            return Err(StateMachineError::IllegalTransition);
        };

        let record = StateTransitionEvent {
            execution_id: self.execution_id.clone(),
            from: self.state,
            to: next,
            event: event.name(),
            at: Timestamp::now(),
        };
        self.state = next;
        self.history.push(record.clone());

        for listener in &self.listeners {
            let _ = catch_unwind(AssertUnwindSafe(|| listener.on_transition(&record)));
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> StateMachine {
        StateMachine::new(ExecutionId::generate())
    }

    #[test]
    fn happy_path_walks_idle_to_completed() {
        let mut sm = machine();
        assert_eq!(sm.apply(Event::Validate), Ok(ExecutionState::Validating));
        assert_eq!(sm.apply(Event::ValidationPassed), Ok(ExecutionState::Planning));
        assert_eq!(sm.apply(Event::PlanReady), Ok(ExecutionState::Executing));
        assert_eq!(sm.apply(Event::StepCompleted), Ok(ExecutionState::Executing));
        assert_eq!(sm.apply(Event::AllStepsCompleted), Ok(ExecutionState::Completed));
        assert_eq!(sm.history().len(), 5);
    }

    #[test]
    fn terminal_state_rejects_every_further_event() {
        let mut sm = machine();
        sm.apply(Event::Validate).ok();
        sm.apply(Event::ValidationFailed).ok();
        assert_eq!(sm.state(), ExecutionState::Failed);
        assert_eq!(sm.apply(Event::Validate), Err(StateMachineError::Terminal));
    }

    #[test]
    fn illegal_transition_is_rejected_without_changing_state() {
        let mut sm = machine();
        assert_eq!(sm.apply(Event::PlanReady), Err(StateMachineError::IllegalTransition));
        assert_eq!(sm.state(), ExecutionState::Idle);
    }

    #[test]
    fn rollback_path_ends_in_completed_when_rollback_succeeds() {
        let mut sm = machine();
        sm.apply(Event::Validate).ok();
        sm.apply(Event::ValidationPassed).ok();
        sm.apply(Event::PlanReady).ok();
        sm.apply(Event::StepFailed).ok();
        assert_eq!(sm.state(), ExecutionState::Failed);
    }

    #[test]
    fn cancel_is_legal_from_awaiting_approval() {
        let mut sm = machine();
        sm.apply(Event::Validate).ok();
        sm.apply(Event::ValidationPassed).ok();
        sm.apply(Event::ApprovalRequired).ok();
        assert_eq!(sm.apply(Event::Cancel), Ok(ExecutionState::Cancelled));
    }

    #[test]
    fn snapshot_and_restore_round_trips_state_and_history() {
        let mut sm = machine();
        sm.apply(Event::Validate).ok();
        let snapshot = sm.snapshot();
        let restored = StateMachine::restore(snapshot);
        assert_eq!(restored.state(), ExecutionState::Validating);
        assert_eq!(restored.history().len(), 1);
    }

    #[test]
    fn panicking_listener_does_not_prevent_the_transition_from_being_recorded() {
        struct PanicListener;
        impl StateChangeListener for PanicListener {
            fn on_transition(&self, _event: &StateTransitionEvent) {
                unreachable!("listener misbehaved");
            }
        }
        let mut sm = machine();
        sm.add_listener(Box::new(PanicListener));
        assert_eq!(sm.apply(Event::Validate), Ok(ExecutionState::Validating));
    }
}
