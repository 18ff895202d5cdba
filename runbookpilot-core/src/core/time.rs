// runbookpilot-core/src/core/time.rs
// ============================================================================
// Module: Timestamps
// Description: Wall-clock timestamp newtype used across execution records.
// Purpose: Give every timestamped record a single serializable type and a
//          single source of "now".
// Dependencies: time
// ============================================================================

//! ## Overview
//! `Timestamp` wraps `time::OffsetDateTime` pinned to UTC and serializes as
//! RFC 3339. Durations between two timestamps are reported in milliseconds,
//! matching the `duration_ms` fields used throughout step and run records.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A UTC wall-clock timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "time::serde::rfc3339")] OffsetDateTime);

impl Timestamp {
    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Wraps an existing `OffsetDateTime`, normalizing it to UTC.
    #[must_use]
    pub fn from_offset(value: OffsetDateTime) -> Self {
        Self(value.to_offset(time::UtcOffset::UTC))
    }

    /// Returns this timestamp advanced by the given number of seconds.
    #[must_use]
    pub fn plus_seconds(self, seconds: i64) -> Self {
        Self(self.0 + time::Duration::seconds(seconds))
    }

    /// Returns whether this timestamp is strictly before `other`.
    #[must_use]
    pub fn is_before(self, other: Self) -> bool {
        self.0 < other.0
    }

    /// Milliseconds elapsed from `self` to `other`; negative if `other` precedes `self`.
    #[must_use]
    pub fn millis_until(self, other: Self) -> i64 {
        (other.0 - self.0).whole_milliseconds().clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Formats the timestamp as RFC 3339 text.
    ///
    /// # Errors
    /// Returns an error if the underlying formatter fails (practically unreachable
    /// for a valid `OffsetDateTime`).
    pub fn to_rfc3339(self) -> Result<String, time::error::Format> {
        self.0.format(&Rfc3339)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(text) => f.write_str(&text),
            Err(_) => fmt::Debug::fmt(&self.0, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Timestamp;

    #[test]
    fn millis_until_measures_forward_gap() {
        let start = Timestamp::now();
        let later = start.plus_seconds(2);
        assert_eq!(start.millis_until(later), 2_000);
    }

    #[test]
    fn is_before_orders_timestamps() {
        let start = Timestamp::now();
        let later = start.plus_seconds(1);
        assert!(start.is_before(later));
        assert!(!later.is_before(start));
    }
}
