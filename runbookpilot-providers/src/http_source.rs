// runbookpilot-providers/src/http_source.rs
// ============================================================================
// Module: HTTP Enrichment Source
// Description: Queries an external HTTP endpoint (threat intel, asset
//              inventory, ...) with the alert document and returns its JSON
//              response as enrichment.
// Purpose: Give the enrichment pipeline a concrete, host-restricted way to
//          call out to an external lookup service.
// Dependencies: runbookpilot-core, reqwest
// ============================================================================

//! ## Overview
//! This source's own `timeout_ms()` is a hint to the enrichment pipeline's
//! per-source race (see `runbookpilot_core::runtime::enrichment`); the HTTP
//! client is additionally given the same budget directly so a hung request
//! never outlives the pipeline's patience for it.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use runbookpilot_core::EnrichmentError;
use runbookpilot_core::EnrichmentSource;
use runbookpilot_core::OpaqueValue;

/// Configuration for one [`HttpEnrichmentSource`].
#[derive(Debug, Clone)]
pub struct HttpEnrichmentSourceConfig {
    /// Stable name this source registers under.
    pub name: String,
    /// Endpoint the alert document is POSTed to.
    pub endpoint: reqwest::Url,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// This source's timeout budget in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response body size accepted, in bytes.
    pub max_response_bytes: usize,
    /// Optional host allowlist; `None` permits the endpoint's own host only.
    pub allowed_hosts: Option<BTreeSet<String>>,
}

impl HttpEnrichmentSourceConfig {
    /// Builds a config that only ever queries `endpoint`'s own host.
    #[must_use]
    pub fn new(name: impl Into<String>, endpoint: reqwest::Url) -> Self {
        Self {
            name: name.into(),
            endpoint,
            allow_http: false,
            timeout_ms: 2_000,
            max_response_bytes: 256 * 1024,
            allowed_hosts: None,
        }
    }
}

/// Queries an external lookup service with the alert document as the body.
pub struct HttpEnrichmentSource {
    config: HttpEnrichmentSourceConfig,
    client: reqwest::Client,
}

impl HttpEnrichmentSource {
    /// Builds a source from `config`.
    ///
    /// # Errors
    /// Returns an error if the endpoint's scheme/host fails the configured
    /// policy, or the underlying HTTP client cannot be built.
    pub fn new(config: HttpEnrichmentSourceConfig) -> Result<Self, String> {
        if config.endpoint.scheme() != "https" && !config.allow_http {
            return Err(format!("cleartext endpoint {} rejected: allow_http is false", config.endpoint));
        }
        if let Some(allowed) = &config.allowed_hosts {
            let host = config.endpoint.host_str().unwrap_or_default();
            if !allowed.contains(host) {
                return Err(format!("endpoint host {host:?} is not in the allowed_hosts list"));
            }
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl EnrichmentSource for HttpEnrichmentSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn timeout_ms(&self) -> u64 {
        self.config.timeout_ms
    }

    async fn enrich(&self, alert: &OpaqueValue) -> Result<OpaqueValue, EnrichmentError> {
        let response = self
            .client
            .post(self.config.endpoint.clone())
            .json(alert)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    EnrichmentError::Timeout
                } else {
                    EnrichmentError::Failed(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(EnrichmentError::Failed(format!("lookup service returned {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(|err| EnrichmentError::Failed(err.to_string()))?;
        if bytes.len() > self.config.max_response_bytes {
            return Err(EnrichmentError::Failed(format!(
                "response exceeds {} byte limit",
                self.config.max_response_bytes
            )));
        }

        serde_json::from_slice(&bytes).map_err(|err| EnrichmentError::Failed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleartext_endpoint_rejected_by_default() {
        let config = HttpEnrichmentSourceConfig::new(
            "threat-intel",
            reqwest::Url::parse("http://intel.example.invalid/lookup").unwrap_or_else(|_| unreachable!()),
        );
        assert!(HttpEnrichmentSource::new(config).is_err());
    }

    #[test]
    fn host_outside_allowlist_rejected() {
        let mut config = HttpEnrichmentSourceConfig::new(
            "threat-intel",
            reqwest::Url::parse("https://intel.example.invalid/lookup").unwrap_or_else(|_| unreachable!()),
        );
        config.allowed_hosts = Some(["other.example.invalid".to_string()].into_iter().collect());
        assert!(HttpEnrichmentSource::new(config).is_err());
    }
}
