// runbookpilot-core/src/runtime/enrichment.rs
// ============================================================================
// Module: Enrichment Pipeline
// Description: Parallel, per-source-timeout alert enrichment ahead of
//              execution.
// Purpose: Run every registered, enabled source concurrently and merge
//          whatever came back before the pipeline as a whole resolves.
// Dependencies: runbookpilot_core::interfaces, serde_json, tokio
// ============================================================================

//! ## Overview
//! One concurrent task per enabled source. Sources never block each other:
//! the pipeline resolves once every source has returned, failed, or hit its
//! own `timeout_ms`. The pipeline itself never fails — a source's failure or
//! timeout is captured as a per-source outcome, not propagated.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::core::OpaqueValue;
use crate::interfaces::EnrichmentSource;

/// The outcome of running one source.
#[derive(Debug, Clone)]
pub enum EnrichmentOutcome {
    /// The source returned data before its timeout.
    Success(OpaqueValue),
    /// The source returned an error before its timeout.
    Failed(String),
    /// The source's own `timeout_ms` elapsed.
    TimedOut,
}

/// One entry of the pipeline's per-source result list.
#[derive(Debug, Clone)]
pub struct EnrichmentRecord {
    /// Source name.
    pub source: String,
    /// What happened when it ran.
    pub outcome: EnrichmentOutcome,
    /// Wall-clock duration this source took, in milliseconds.
    pub duration_ms: i64,
}

/// Aggregated output of one enrichment pass.
#[derive(Debug, Clone)]
pub struct EnrichmentResult {
    /// The alert that was enriched.
    pub alert: OpaqueValue,
    /// Per-source records, in completion order.
    pub enrichments: Vec<EnrichmentRecord>,
    /// Total wall-clock duration of the pipeline pass, in milliseconds.
    pub total_duration_ms: i64,
    /// Count of sources that returned successfully.
    pub success_count: u32,
    /// Count of sources that failed or timed out.
    pub failure_count: u32,
    /// Successful sources' data, keyed by source name.
    pub enriched_context: BTreeMap<String, Value>,
}

/// A concurrent-read/exclusive-write registry of enrichment sources, keyed by
/// name. Registering a source with an existing name replaces it.
#[derive(Default)]
pub struct EnrichmentRegistry {
    sources: std::sync::RwLock<BTreeMap<String, RegisteredSource>>,
}

struct RegisteredSource {
    source: Arc<dyn EnrichmentSource>,
    enabled: bool,
}

impl EnrichmentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces, by name) a source.
    pub fn register(&self, source: Arc<dyn EnrichmentSource>, enabled: bool) {
        let name = source.name().to_string();
        #[allow(clippy::unwrap_used, reason = "poisoned registry lock is unrecoverable process state")]
        let mut guard = self.sources.write().unwrap();
        guard.insert(name, RegisteredSource { source, enabled });
    }

    /// Returns a snapshot of the currently enabled sources.
    fn enabled_snapshot(&self) -> Vec<Arc<dyn EnrichmentSource>> {
        #[allow(clippy::unwrap_used, reason = "poisoned registry lock is unrecoverable process state")]
        let guard = self.sources.read().unwrap();
        guard.values().filter(|entry| entry.enabled).map(|entry| Arc::clone(&entry.source)).collect()
    }

    /// Runs every enabled source concurrently against `alert`, merging results.
    pub async fn enrich(&self, alert: OpaqueValue) -> EnrichmentResult {
        let pipeline_start = std::time::Instant::now();
        let sources = self.enabled_snapshot();

        let tasks = sources.into_iter().map(|source| {
            let alert = alert.clone();
            async move {
                let name = source.name().to_string();
                let started = std::time::Instant::now();
                let outcome = match tokio::time::timeout(
                    Duration::from_millis(source.timeout_ms()),
                    source.enrich(&alert),
                )
                .await
                {
                    Ok(Ok(data)) => EnrichmentOutcome::Success(data),
                    Ok(Err(err)) => EnrichmentOutcome::Failed(err.to_string()),
                    Err(_) => EnrichmentOutcome::TimedOut,
                };
                EnrichmentRecord {
                    source: name,
                    outcome,
                    duration_ms: started.elapsed().as_millis() as i64,
                }
            }
        });

        let enrichments: Vec<EnrichmentRecord> = futures_join_all(tasks).await;

        let mut enriched_context = BTreeMap::new();
        let mut success_count = 0u32;
        let mut failure_count = 0u32;
        for record in &enrichments {
            match &record.outcome {
                EnrichmentOutcome::Success(data) => {
                    success_count += 1;
                    enriched_context.insert(record.source.clone(), data.clone());
                }
                EnrichmentOutcome::Failed(_) | EnrichmentOutcome::TimedOut => failure_count += 1,
            }
        }

        EnrichmentResult {
            alert,
            enrichments,
            total_duration_ms: pipeline_start.elapsed().as_millis() as i64,
            success_count,
            failure_count,
            enriched_context,
        }
    }
}

/// Minimal join-all helper so this module does not need the `futures` crate
/// solely for one combinator; `tokio::join!` cannot take a dynamic-length
/// list, so tasks are spawned and awaited in order of completion via
/// `FuturesUnordered`-free buffering over `tokio::task::JoinSet`.
async fn futures_join_all<F, T>(tasks: impl IntoIterator<Item = F>) -> Vec<T>
where
    F: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut set = tokio::task::JoinSet::new();
    for task in tasks {
        set.spawn(task);
    }
    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        if let Ok(value) = joined {
            results.push(value);
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::interfaces::EnrichmentError;

    struct InstantSource {
        name: &'static str,
    }

    #[async_trait]
    impl EnrichmentSource for InstantSource {
        fn name(&self) -> &str {
            self.name
        }

        fn timeout_ms(&self) -> u64 {
            50
        }

        async fn enrich(&self, _alert: &OpaqueValue) -> Result<OpaqueValue, EnrichmentError> {
            Ok(serde_json::json!({"ok": true}))
        }
    }

    struct SlowSource;

    #[async_trait]
    impl EnrichmentSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        fn timeout_ms(&self) -> u64 {
            1
        }

        async fn enrich(&self, _alert: &OpaqueValue) -> Result<OpaqueValue, EnrichmentError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(serde_json::json!({"late": true}))
        }
    }

    #[tokio::test]
    async fn successful_sources_populate_enriched_context() {
        let registry = EnrichmentRegistry::new();
        registry.register(Arc::new(InstantSource { name: "intel" }), true);
        let result = registry.enrich(serde_json::json!({})).await;
        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 0);
        assert!(result.enriched_context.contains_key("intel"));
    }

    #[tokio::test]
    async fn slow_sources_time_out_without_failing_the_pipeline() {
        let registry = EnrichmentRegistry::new();
        registry.register(Arc::new(SlowSource), true);
        let result = registry.enrich(serde_json::json!({})).await;
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn disabled_sources_are_skipped() {
        let registry = EnrichmentRegistry::new();
        registry.register(Arc::new(InstantSource { name: "disabled" }), false);
        let result = registry.enrich(serde_json::json!({})).await;
        assert!(result.enrichments.is_empty());
    }

    #[tokio::test]
    async fn registering_the_same_name_replaces_the_entry() {
        let registry = EnrichmentRegistry::new();
        registry.register(Arc::new(InstantSource { name: "intel" }), true);
        registry.register(Arc::new(InstantSource { name: "intel" }), false);
        let result = registry.enrich(serde_json::json!({})).await;
        assert!(result.enrichments.is_empty());
    }
}
