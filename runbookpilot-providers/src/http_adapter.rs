// runbookpilot-providers/src/http_adapter.rs
// ============================================================================
// Module: HTTP Adapter
// Description: Dispatches step actions as JSON POSTs to a configured webhook.
// Purpose: Let a deployment point a step's executor at a SIEM/EDR/ticketing
//          webhook without writing a bespoke Adapter.
// Dependencies: runbookpilot-core, reqwest
// ============================================================================

//! ## Overview
//! In `ExecutionMode::Simulation` and `ExecutionMode::DryRun`, this adapter
//! never issues the request: it returns a predicted, clearly-tagged output
//! so the L2 simulation tier's "adapters must not mutate" contract holds
//! without the adapter author having to reason about it per-action. Host and
//! scheme are validated against an allowlist before any request is made,
//! matching the host-restriction posture of the evidence-provider HTTP
//! client this is grounded on.

use std::collections::BTreeSet;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use runbookpilot_core::Adapter;
use runbookpilot_core::AdapterError;
use runbookpilot_core::AdapterResult;
use runbookpilot_core::ExecutionMode;
use runbookpilot_core::OpaqueValue;

/// Configuration for one [`HttpAdapter`] instance.
#[derive(Debug, Clone)]
pub struct HttpAdapterConfig {
    /// Webhook endpoint every action is POSTed to.
    pub endpoint: reqwest::Url,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response body size accepted, in bytes.
    pub max_response_bytes: usize,
    /// Optional host allowlist; `None` permits the endpoint's own host only.
    pub allowed_hosts: Option<BTreeSet<String>>,
    /// Name reported as `executor` on every result.
    pub executor_name: String,
}

impl HttpAdapterConfig {
    /// Builds a config that only ever talks to `endpoint`'s own host.
    #[must_use]
    pub fn new(endpoint: reqwest::Url, executor_name: impl Into<String>) -> Self {
        Self {
            endpoint,
            allow_http: false,
            timeout_ms: 5_000,
            max_response_bytes: 1024 * 1024,
            allowed_hosts: None,
            executor_name: executor_name.into(),
        }
    }
}

/// Dispatches actions as JSON POSTs: `{"action": ..., "params": ...}`.
pub struct HttpAdapter {
    config: HttpAdapterConfig,
    client: reqwest::Client,
}

impl HttpAdapter {
    /// Builds an adapter from `config`.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built or the
    /// endpoint's scheme/host fails the configured policy.
    pub fn new(config: HttpAdapterConfig) -> Result<Self, String> {
        validate_endpoint(&config)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self { config, client })
    }

    fn error(&self, action: &str, started: Instant, code: &str, message: impl Into<String>) -> AdapterResult {
        AdapterResult {
            success: false,
            action: action.to_string(),
            executor: self.config.executor_name.clone(),
            duration_ms: elapsed_ms(started),
            output: None,
            error: Some(AdapterError {
                code: code.to_string(),
                message: message.into(),
                adapter: self.config.executor_name.clone(),
                action: action.to_string(),
                retryable: code == "HTTP_TIMEOUT",
            }),
        }
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    async fn execute(&self, action: &str, params: &OpaqueValue, mode: ExecutionMode) -> AdapterResult {
        let started = Instant::now();

        if matches!(mode, ExecutionMode::Simulation | ExecutionMode::DryRun) {
            return AdapterResult {
                success: true,
                action: action.to_string(),
                executor: self.config.executor_name.clone(),
                duration_ms: elapsed_ms(started),
                output: Some(serde_json::json!({
                    "predicted": true,
                    "mode": mode_label(mode),
                    "would_post_to": self.config.endpoint.as_str(),
                })),
                error: None,
            };
        }

        let body = serde_json::json!({"action": action, "params": params});
        let response = match self.client.post(self.config.endpoint.clone()).json(&body).send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return self.error(action, started, "STEP_TIMEOUT", err.to_string()),
            Err(err) => return self.error(action, started, "STEP_EXECUTION_FAILED", err.to_string()),
        };

        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return self.error(action, started, "STEP_EXECUTION_FAILED", err.to_string()),
        };
        if bytes.len() > self.config.max_response_bytes {
            return self.error(
                action,
                started,
                "STEP_EXECUTION_FAILED",
                format!("response exceeds {} byte limit", self.config.max_response_bytes),
            );
        }

        let output: OpaqueValue =
            serde_json::from_slice(&bytes).unwrap_or_else(|_| serde_json::Value::Null);

        if !status.is_success() {
            return self.error(action, started, "STEP_EXECUTION_FAILED", format!("webhook returned {status}"));
        }

        AdapterResult {
            success: true,
            action: action.to_string(),
            executor: self.config.executor_name.clone(),
            duration_ms: elapsed_ms(started),
            output: Some(output),
            error: None,
        }
    }
}

fn mode_label(mode: ExecutionMode) -> &'static str {
    match mode {
        ExecutionMode::Production => "production",
        ExecutionMode::Simulation => "simulation",
        ExecutionMode::DryRun => "dry-run",
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

fn validate_endpoint(config: &HttpAdapterConfig) -> Result<(), String> {
    if config.endpoint.scheme() != "https" && !config.allow_http {
        return Err(format!("cleartext endpoint {} rejected: allow_http is false", config.endpoint));
    }
    if let Some(allowed) = &config.allowed_hosts {
        let host = config.endpoint.host_str().unwrap_or_default();
        if !allowed.contains(host) {
            return Err(format!("endpoint host {host:?} is not in the allowed_hosts list"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use runbookpilot_core::ExecutionMode;

    use super::*;

    #[tokio::test]
    async fn simulation_mode_never_issues_a_request() {
        let config =
            HttpAdapterConfig::new(reqwest::Url::parse("https://edr.example.invalid/actions").unwrap_or_else(|_| unreachable!()), "edr");
        let adapter = HttpAdapter::new(config).unwrap_or_else(|_| unreachable!("https endpoint is accepted"));
        let result = adapter
            .execute("isolate_host", &serde_json::json!({"host_id": "h-1"}), ExecutionMode::Simulation)
            .await;
        assert!(result.success);
        assert_eq!(result.output.and_then(|o| o.get("predicted").cloned()), Some(serde_json::json!(true)));
    }

    #[test]
    fn cleartext_endpoint_rejected_by_default() {
        let config =
            HttpAdapterConfig::new(reqwest::Url::parse("http://edr.example.invalid/actions").unwrap_or_else(|_| unreachable!()), "edr");
        assert!(HttpAdapter::new(config).is_err());
    }
}
