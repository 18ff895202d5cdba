// runbookpilot-providers/src/time_source.rs
// ============================================================================
// Module: Time Enrichment Source
// Description: Derives time-of-day/day-of-week enrichment from the alert's
//              own `@timestamp`, never from the wall clock.
// Purpose: Give trigger/condition expressions a stable notion of "business
//          hours" or "weekend" that replays identically in simulation and in
//          a later re-run of the same alert.
// Dependencies: runbookpilot-core, time
// ============================================================================

//! ## Overview
//! Reading `std::time::SystemTime`/`OffsetDateTime::now_utc()` here would make
//! a runbook's trigger conditions depend on *when the engine happened to run*
//! rather than on the alert itself, which breaks deterministic replay and
//! simulation parity. This source instead parses the alert's `@timestamp`
//! field and reports facts about that instant.

use async_trait::async_trait;
use runbookpilot_core::EnrichmentError;
use runbookpilot_core::EnrichmentSource;
use runbookpilot_core::OpaqueValue;
use time::OffsetDateTime;
use time::Weekday;

/// Stable registration name for [`TimeEnrichmentSource`].
pub const NAME: &str = "time";

/// Derives calendar facts from the alert's own `@timestamp` field.
#[derive(Debug, Clone)]
pub struct TimeEnrichmentSource {
    timeout_ms: u64,
}

impl Default for TimeEnrichmentSource {
    fn default() -> Self {
        Self { timeout_ms: 50 }
    }
}

impl TimeEnrichmentSource {
    /// Builds a source with the given timeout budget in milliseconds.
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        Self { timeout_ms }
    }
}

#[async_trait]
impl EnrichmentSource for TimeEnrichmentSource {
    fn name(&self) -> &str {
        NAME
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    async fn enrich(&self, alert: &OpaqueValue) -> Result<OpaqueValue, EnrichmentError> {
        let raw = alert
            .get("@timestamp")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| EnrichmentError::Failed("alert has no @timestamp field".to_string()))?;

        let parsed = OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
            .map_err(|err| EnrichmentError::Failed(format!("@timestamp is not RFC3339: {err}")))?;

        let weekday = parsed.weekday();
        let is_weekend = matches!(weekday, Weekday::Saturday | Weekday::Sunday);
        let hour = parsed.hour();
        let is_business_hours = !is_weekend && (9..17).contains(&hour);

        Ok(serde_json::json!({
            "hour_utc": hour,
            "weekday": weekday.to_string(),
            "is_weekend": is_weekend,
            "is_business_hours": is_business_hours,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn derives_facts_from_alert_timestamp_not_wall_clock() {
        let source = TimeEnrichmentSource::default();
        let alert = serde_json::json!({"@timestamp": "2026-07-28T03:00:00Z"});
        let result = source.enrich(&alert).await.unwrap_or_else(|_| unreachable!("valid rfc3339 timestamp"));
        assert_eq!(result.get("is_business_hours"), Some(&serde_json::json!(false)));
        assert_eq!(result.get("weekday"), Some(&serde_json::json!("Tuesday")));
    }

    #[tokio::test]
    async fn missing_timestamp_is_reported_as_failed_not_timed_out() {
        let source = TimeEnrichmentSource::default();
        let alert = serde_json::json!({});
        assert_eq!(source.enrich(&alert).await, Err(EnrichmentError::Failed("alert has no @timestamp field".to_string())));
    }
}
