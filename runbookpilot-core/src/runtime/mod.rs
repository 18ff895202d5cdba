// runbookpilot-core/src/runtime/mod.rs
// ============================================================================
// Module: Runtime Engine
// Description: Trigger evaluation, the step scheduler, the three automation
//              tier executors, the approval queue, rollback, the hash-chained
//              audit log, metrics, and the orchestrator that composes them.
// Purpose: Everything that drives a validated Runbook to a terminal outcome.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module tree is layered bottom-up: [`classifier`], [`impact`], and
//! [`confidence`] are pure scoring helpers; [`templating`] and
//! [`template_context`] resolve `{{ }}` expressions; [`scheduler`] dispatches
//! one step; [`tiers`] walks a whole runbook under one automation level;
//! [`approval_queue`], [`rollback`], [`audit_log`], [`controller`], and
//! [`store`] are the engine's persistence and lifecycle collaborators; and
//! [`orchestrator`] is the single entry point that wires all of it together.

pub mod approval_queue;
pub mod audit_log;
pub mod classifier;
pub mod confidence;
pub mod controller;
pub mod enrichment;
pub mod impact;
pub mod metrics;
pub mod orchestrator;
pub mod rollback;
pub mod scheduler;
pub mod state_machine;
pub mod store;
pub mod template_context;
pub mod templating;
pub mod tiers;
pub mod trigger_eval;

pub use approval_queue::ApprovalQueue;
pub use approval_queue::ApprovalQueueError;
pub use audit_log::AuditLog;
pub use audit_log::AuditLogError;
pub use audit_log::compute_hash;
pub use classifier::ActionClass;
pub use classifier::classify;
pub use confidence::ConfidenceInputs;
pub use confidence::DetectforgeConfidence;
pub use confidence::aggregate_report_confidence;
pub use confidence::score_step;
pub use controller::AbortReason;
pub use controller::ControllerError;
pub use controller::ExecutionController;
pub use controller::ExecutionHandle;
pub use controller::ExecutionHandleStatus;
pub use controller::LifecycleCallback;
pub use enrichment::EnrichmentOutcome;
pub use enrichment::EnrichmentRecord;
pub use enrichment::EnrichmentRegistry;
pub use enrichment::EnrichmentResult;
pub use impact::assess;
pub use impact::blast_radius;
pub use metrics::SimulationMetricsCollector;
pub use metrics::SimulationMetricsSnapshot;
pub use orchestrator::ExecutionResult;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorCallbacks;
pub use orchestrator::OrchestratorError;
pub use rollback::RollbackEngine;
pub use rollback::RollbackOutcome;
pub use scheduler::AdapterRegistry;
pub use scheduler::StepOutcome;
pub use scheduler::StepScheduler;
pub use scheduler::execute_step;
pub use scheduler::resolve_parameters;
pub use scheduler::topological_order;
pub use state_machine::Event;
pub use state_machine::StateChangeListener;
pub use state_machine::StateMachine;
pub use state_machine::StateMachineError;
pub use state_machine::StateMachineSnapshot;
pub use state_machine::StateTransitionEvent;
pub use store::InMemoryApprovalStore;
pub use store::InMemoryAuditSink;
pub use store::InMemoryRunStateStore;
pub use template_context::BuiltContext;
pub use templating::Resolved;
pub use templating::TemplateContext;
pub use tiers::AlwaysApprove;
pub use tiers::AlwaysConfirm;
pub use tiers::ApprovalCallback;
pub use tiers::ConfirmationCallback;
pub use tiers::L0Executor;
pub use tiers::L1Executor;
pub use tiers::L2Executor;
pub use tiers::TierExecutor;
pub use tiers::TierRunOutcome;
pub use trigger_eval::TriggerEvaluation;
pub use trigger_eval::evaluate_trigger;
