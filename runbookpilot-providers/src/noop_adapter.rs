// runbookpilot-providers/src/noop_adapter.rs
// ============================================================================
// Module: No-Op Adapter
// Description: Always-succeeding adapter that never touches an external
//              system.
// Purpose: Let read-only and display-only runbook steps (notify, log,
//          annotate) run against a real executor without standing up a
//          dedicated integration.
// Dependencies: runbookpilot-core
// ============================================================================

use async_trait::async_trait;
use runbookpilot_core::Adapter;
use runbookpilot_core::AdapterResult;
use runbookpilot_core::ExecutionMode;
use runbookpilot_core::OpaqueValue;

/// Echoes its resolved parameters back as output and always succeeds.
#[derive(Debug, Clone, Default)]
pub struct NoopAdapter {
    executor_name: String,
}

impl NoopAdapter {
    /// Builds a no-op adapter reporting `executor_name` on every result.
    #[must_use]
    pub fn new(executor_name: impl Into<String>) -> Self {
        Self { executor_name: executor_name.into() }
    }
}

#[async_trait]
impl Adapter for NoopAdapter {
    async fn execute(&self, action: &str, params: &OpaqueValue, mode: ExecutionMode) -> AdapterResult {
        AdapterResult {
            success: true,
            action: action.to_string(),
            executor: self.executor_name.clone(),
            duration_ms: 0,
            output: Some(serde_json::json!({
                "mode": match mode {
                    ExecutionMode::Production => "production",
                    ExecutionMode::Simulation => "simulation",
                    ExecutionMode::DryRun => "dry-run",
                },
                "echo": params,
            })),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_resolved_parameters() {
        let adapter = NoopAdapter::new("noop");
        let result = adapter
            .execute("notify_team", &serde_json::json!({"channel": "#soc"}), ExecutionMode::Production)
            .await;
        assert!(result.success);
        assert_eq!(
            result.output.and_then(|o| o.get("echo").cloned()),
            Some(serde_json::json!({"channel": "#soc"}))
        );
    }
}
