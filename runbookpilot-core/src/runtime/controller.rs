// runbookpilot-core/src/runtime/controller.rs
// ============================================================================
// Module: Execution Controller
// Description: Per-execution cancellation and overall-timeout tracking.
// Purpose: Give the orchestrator one shared `should_abort` check the tier
//          executors poll between steps, and a timer that fires cancellation
//          once a runbook's `max_execution_time` elapses.
// Dependencies: crate::core, tokio
// ============================================================================

//! ## Overview
//! One [`ExecutionController`] instance can track many concurrently running
//! executions. Registering a handle starts a background timer; the timer is
//! cancelled automatically once the execution is marked completed, failed, or
//! cancelled through this controller, so a finished execution never fires a
//! stale timeout.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::ExecutionId;
use crate::core::Timestamp;

/// Status of one tracked execution handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionHandleStatus {
    /// Still running, not yet aborted.
    Running,
    /// Finished normally (success or failure, decided elsewhere).
    Completed,
    /// Cancelled on external request.
    Cancelled,
    /// The registered `max_execution_time` elapsed.
    TimedOut,
}

/// Bookkeeping for one tracked execution.
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    /// Current handle status.
    pub status: ExecutionHandleStatus,
    /// When the execution was registered.
    pub started_at: Timestamp,
    /// Reason given for cancellation, if cancelled.
    pub cancel_reason: Option<String>,
}

/// Reason an execution was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Cancelled on external request.
    Cancelled,
    /// The overall execution timeout elapsed.
    TimedOut,
}

/// Errors raised by controller operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// No handle is registered for the given execution id.
    #[error("no execution handle registered for this execution")]
    NotRegistered,
}

/// A lifecycle callback invoked when an execution is cancelled or times out.
#[async_trait]
pub trait LifecycleCallback: Send + Sync {
    /// Called once, when the abort is first recorded.
    async fn call(&self, execution_id: &ExecutionId, reason: AbortReason);
}

struct TrackedExecution {
    handle: ExecutionHandle,
    abort_flag: Arc<std::sync::atomic::AtomicBool>,
    timer: Option<tokio::task::JoinHandle<()>>,
}

/// Tracks cancellation and overall-timeout state for concurrently running
/// executions. Cheaply cloneable; all state lives behind an `Arc`.
#[derive(Clone, Default)]
pub struct ExecutionController {
    executions: Arc<Mutex<BTreeMap<ExecutionId, TrackedExecution>>>,
}

impl ExecutionController {
    /// Creates an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new execution, starting its overall-timeout timer.
    /// `on_timeout` is called once, in a spawned task, if the timer elapses
    /// before the execution is marked completed or cancelled.
    pub fn start_execution(
        &self,
        execution_id: ExecutionId,
        max_execution_time: Duration,
        on_timeout: Option<Arc<dyn LifecycleCallback>>,
    ) {
        let abort_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let timer = {
            let executions = Arc::clone(&self.executions);
            let abort_flag = Arc::clone(&abort_flag);
            let execution_id = execution_id.clone();
            Some(tokio::spawn(async move {
                tokio::time::sleep(max_execution_time).await;
                let fired = {
                    #[allow(clippy::unwrap_used, reason = "poisoned controller lock is unrecoverable process state")]
                    let mut guard = executions.lock().unwrap();
                    if let Some(tracked) = guard.get_mut(&execution_id) {
                        if tracked.handle.status == ExecutionHandleStatus::Running {
                            tracked.handle.status = ExecutionHandleStatus::TimedOut;
                            abort_flag.store(true, std::sync::atomic::Ordering::SeqCst);
                            true
                        } else {
                            false
                        }
                    } else {
                        false
                    }
                };
                if fired {
                    if let Some(callback) = on_timeout {
                        callback.call(&execution_id, AbortReason::TimedOut).await;
                    }
                }
            }))
        };

        let tracked = TrackedExecution {
            handle: ExecutionHandle {
                status: ExecutionHandleStatus::Running,
                started_at: Timestamp::now(),
                cancel_reason: None,
            },
            abort_flag,
            timer,
        };
        #[allow(clippy::unwrap_used, reason = "poisoned controller lock is unrecoverable process state")]
        let mut guard = self.executions.lock().unwrap();
        guard.insert(execution_id, tracked);
    }

    /// Cancels a running execution with the given reason.
    ///
    /// # Errors
    /// Returns [`ControllerError::NotRegistered`] if no handle exists for
    /// `execution_id`.
    pub fn cancel_execution(&self, execution_id: &ExecutionId, reason: &str) -> Result<(), ControllerError> {
        #[allow(clippy::unwrap_used, reason = "poisoned controller lock is unrecoverable process state")]
        let mut guard = self.executions.lock().unwrap();
        let Some(tracked) = guard.get_mut(execution_id) else { return Err(ControllerError::NotRegistered) };
        tracked.handle.status = ExecutionHandleStatus::Cancelled;
        tracked.handle.cancel_reason = Some(reason.to_string());
        tracked.abort_flag.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    /// Marks an execution finished, cancelling its timeout timer.
    ///
    /// # Errors
    /// Returns [`ControllerError::NotRegistered`] if no handle exists for
    /// `execution_id`.
    pub fn complete_execution(&self, execution_id: &ExecutionId) -> Result<(), ControllerError> {
        #[allow(clippy::unwrap_used, reason = "poisoned controller lock is unrecoverable process state")]
        let mut guard = self.executions.lock().unwrap();
        let Some(tracked) = guard.get_mut(execution_id) else { return Err(ControllerError::NotRegistered) };
        if tracked.handle.status == ExecutionHandleStatus::Running {
            tracked.handle.status = ExecutionHandleStatus::Completed;
        }
        if let Some(timer) = tracked.timer.take() {
            timer.abort();
        }
        Ok(())
    }

    /// Whether `execution_id` has been asked to stop (cancelled or timed out).
    #[must_use]
    pub fn should_abort(&self, execution_id: &ExecutionId) -> bool {
        #[allow(clippy::unwrap_used, reason = "poisoned controller lock is unrecoverable process state")]
        let guard = self.executions.lock().unwrap();
        guard.get(execution_id).is_some_and(|tracked| tracked.abort_flag.load(std::sync::atomic::Ordering::SeqCst))
    }

    /// Returns the handle snapshot for `execution_id`, if tracked.
    #[must_use]
    pub fn handle(&self, execution_id: &ExecutionId) -> Option<ExecutionHandle> {
        #[allow(clippy::unwrap_used, reason = "poisoned controller lock is unrecoverable process state")]
        let guard = self.executions.lock().unwrap();
        guard.get(execution_id).map(|tracked| tracked.handle.clone())
    }

    /// Cancels every running execution's timer and marks it cancelled. Used
    /// on process shutdown so no timer outlives the controller.
    pub fn shutdown_all(&self) {
        #[allow(clippy::unwrap_used, reason = "poisoned controller lock is unrecoverable process state")]
        let mut guard = self.executions.lock().unwrap();
        for tracked in guard.values_mut() {
            if tracked.handle.status == ExecutionHandleStatus::Running {
                tracked.handle.status = ExecutionHandleStatus::Cancelled;
                tracked.handle.cancel_reason = Some("controller shutdown".to_string());
            }
            tracked.abort_flag.store(true, std::sync::atomic::Ordering::SeqCst);
            if let Some(timer) = tracked.timer.take() {
                timer.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_sets_the_abort_flag() {
        let controller = ExecutionController::new();
        let execution_id = ExecutionId::generate();
        controller.start_execution(execution_id.clone(), Duration::from_secs(60), None);
        assert!(!controller.should_abort(&execution_id));
        controller.cancel_execution(&execution_id, "analyst request").unwrap_or(());
        assert!(controller.should_abort(&execution_id));
    }

    #[tokio::test]
    async fn complete_execution_cancels_the_timer() {
        let controller = ExecutionController::new();
        let execution_id = ExecutionId::generate();
        controller.start_execution(execution_id.clone(), Duration::from_millis(20), None);
        controller.complete_execution(&execution_id).unwrap_or(());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!controller.should_abort(&execution_id));
    }

    #[tokio::test]
    async fn operations_on_an_unregistered_execution_return_not_registered() {
        let controller = ExecutionController::new();
        let execution_id = ExecutionId::generate();
        assert_eq!(controller.cancel_execution(&execution_id, "x"), Err(ControllerError::NotRegistered));
    }

    #[tokio::test]
    async fn shutdown_all_aborts_every_running_execution() {
        let controller = ExecutionController::new();
        let a = ExecutionId::generate();
        let b = ExecutionId::generate();
        controller.start_execution(a.clone(), Duration::from_secs(60), None);
        controller.start_execution(b.clone(), Duration::from_secs(60), None);
        controller.shutdown_all();
        assert!(controller.should_abort(&a));
        assert!(controller.should_abort(&b));
    }
}
