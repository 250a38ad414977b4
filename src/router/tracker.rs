//! Persistent Usage Tracker
//!
//! One record per provider: requests and tokens consumed inside the
//! current UTC calendar day, plus cooldown and failure timestamps.
//! State survives process restarts - each CI run is a fresh process.
//!
//! ## Invariants
//!
//! - Counts are valid only for the calendar day in `window_start`; any
//!   access on a later day resets counts to zero first. The reset is lazy,
//!   triggered by the next access - there is no background timer.
//! - The whole snapshot is rewritten after every mutation. Durability over
//!   throughput: call volume is tens per run.
//! - Writes go through a temp file + rename, so a crashed run never leaves
//!   a half-written snapshot. Concurrent processes still race
//!   (last-writer-wins); CI scheduling is normally serial.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::types::{LexError, Result};

// =============================================================================
// Usage Record
// =============================================================================

/// Consumption record for one provider, scoped to a UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Requests made inside the current window
    pub requests_used: u32,
    /// Tokens consumed inside the current window
    pub tokens_used: u64,
    /// Calendar day the counts belong to
    pub window_start: NaiveDate,
    /// Provider is unavailable until this instant, if set
    #[serde(default)]
    pub cooldown_until: Option<DateTime<Utc>>,
    /// Last non-rate-limit failure, for diagnostics only
    #[serde(default)]
    pub last_failure: Option<DateTime<Utc>>,
}

impl UsageRecord {
    /// Zeroed record for a given day.
    pub fn fresh(day: NaiveDate) -> Self {
        Self {
            requests_used: 0,
            tokens_used: 0,
            window_start: day,
            cooldown_until: None,
            last_failure: None,
        }
    }

    /// Apply the lazy day-window reset: if `today` has advanced past the
    /// stored window, counts go back to zero. Cooldown and failure
    /// timestamps are instants, not day counters - they carry over and
    /// expire on their own.
    pub fn rolled_to(&self, today: NaiveDate) -> Self {
        if self.window_start == today {
            self.clone()
        } else {
            Self {
                requests_used: 0,
                tokens_used: 0,
                window_start: today,
                cooldown_until: self.cooldown_until,
                last_failure: self.last_failure,
            }
        }
    }

    /// Whether the provider is inside a rate-limit cooldown at `now`.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }
}

// =============================================================================
// Usage Tracker
// =============================================================================

/// Persistent per-provider usage state, keyed by provider name.
///
/// Owned exclusively by the router; the snapshot file is the only
/// serialization point between processes.
pub struct UsageTracker {
    /// None disables persistence (in-memory mode for tests)
    path: Option<PathBuf>,
    records: HashMap<String, UsageRecord>,
}

impl UsageTracker {
    /// Load the snapshot, or start empty when the file does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|e| {
                LexError::Storage(format!(
                    "corrupt tracker snapshot {}: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: Some(path),
            records,
        })
    }

    /// Tracker that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: HashMap::new(),
        }
    }

    /// Current record for a provider with the day-window reset applied,
    /// creating a zeroed record on first access. Mutates in place but does
    /// not persist - persistence happens on `record_*`.
    pub fn get(&mut self, provider: &str, today: NaiveDate) -> UsageRecord {
        let entry = self
            .records
            .entry(provider.to_string())
            .or_insert_with(|| UsageRecord::fresh(today));
        *entry = entry.rolled_to(today);
        entry.clone()
    }

    /// Read-only view with the day-window reset applied virtually;
    /// neither mutates nor persists. Used by availability reporting.
    pub fn peek(&self, provider: &str, today: NaiveDate) -> UsageRecord {
        self.records
            .get(provider)
            .map(|r| r.rolled_to(today))
            .unwrap_or_else(|| UsageRecord::fresh(today))
    }

    /// Account a successful call: one request, `tokens` tokens. Persists.
    pub fn record_success(&mut self, provider: &str, tokens: u64, now: DateTime<Utc>) -> Result<()> {
        let today = now.date_naive();
        let entry = self
            .records
            .entry(provider.to_string())
            .or_insert_with(|| UsageRecord::fresh(today));
        *entry = entry.rolled_to(today);
        entry.requests_used += 1;
        entry.tokens_used += tokens;
        debug!(
            provider,
            requests = entry.requests_used,
            tokens = entry.tokens_used,
            "Recorded successful call"
        );
        self.persist()
    }

    /// A rate-limit response puts the provider on cooldown. Persists.
    pub fn record_rate_limited(
        &mut self,
        provider: &str,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let today = now.date_naive();
        let entry = self
            .records
            .entry(provider.to_string())
            .or_insert_with(|| UsageRecord::fresh(today));
        *entry = entry.rolled_to(today);
        entry.cooldown_until =
            Some(now + chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::hours(1)));
        entry.last_failure = Some(now);
        debug!(provider, ?cooldown, "Provider placed on cooldown");
        self.persist()
    }

    /// Any other failure only stamps a timestamp. Persists.
    pub fn record_failure(&mut self, provider: &str, now: DateTime<Utc>) -> Result<()> {
        let today = now.date_naive();
        let entry = self
            .records
            .entry(provider.to_string())
            .or_insert_with(|| UsageRecord::fresh(today));
        *entry = entry.rolled_to(today);
        entry.last_failure = Some(now);
        self.persist()
    }

    /// Write the whole snapshot atomically (temp file + rename).
    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(&self.records)?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_first_access_creates_zeroed_record() {
        let mut tracker = UsageTracker::in_memory();
        let record = tracker.get("free-a", day("2025-06-10"));
        assert_eq!(record.requests_used, 0);
        assert_eq!(record.tokens_used, 0);
        assert_eq!(record.window_start, day("2025-06-10"));
    }

    #[test]
    fn test_day_window_reset_on_later_access() {
        let mut tracker = UsageTracker::in_memory();
        let now = at("2025-06-10T12:00:00Z");
        tracker.record_success("free-a", 500, now).unwrap();
        tracker.record_success("free-a", 500, now).unwrap();

        // Same day: counts visible
        let same_day = tracker.get("free-a", day("2025-06-10"));
        assert_eq!(same_day.requests_used, 2);
        assert_eq!(same_day.tokens_used, 1000);

        // Next day: counts reset, window advanced
        let next_day = tracker.get("free-a", day("2025-06-11"));
        assert_eq!(next_day.requests_used, 0);
        assert_eq!(next_day.tokens_used, 0);
        assert_eq!(next_day.window_start, day("2025-06-11"));
    }

    #[test]
    fn test_accounting_accumulates() {
        let mut tracker = UsageTracker::in_memory();
        let now = at("2025-06-10T12:00:00Z");
        for _ in 0..5 {
            tracker.record_success("free-a", 200, now).unwrap();
        }
        let record = tracker.peek("free-a", day("2025-06-10"));
        assert_eq!(record.requests_used, 5);
        assert_eq!(record.tokens_used, 1000);
    }

    #[test]
    fn test_cooldown_set_and_expiry() {
        let mut tracker = UsageTracker::in_memory();
        let now = at("2025-06-10T12:00:00Z");
        tracker
            .record_rate_limited("free-a", Duration::from_secs(3600), now)
            .unwrap();

        let record = tracker.peek("free-a", day("2025-06-10"));
        assert!(record.in_cooldown(at("2025-06-10T12:30:00Z")));
        assert!(!record.in_cooldown(at("2025-06-10T13:00:01Z")));
    }

    #[test]
    fn test_cooldown_survives_day_reset() {
        let now = at("2025-06-10T23:30:00Z");
        let mut tracker = UsageTracker::in_memory();
        tracker
            .record_rate_limited("free-a", Duration::from_secs(3600), now)
            .unwrap();

        // Day rolls over at midnight but the cooldown instant has not passed
        let record = tracker.get("free-a", day("2025-06-11"));
        assert_eq!(record.requests_used, 0);
        assert!(record.in_cooldown(at("2025-06-11T00:10:00Z")));
    }

    #[test]
    fn test_failure_only_stamps_timestamp() {
        let mut tracker = UsageTracker::in_memory();
        let now = at("2025-06-10T12:00:00Z");
        tracker.record_failure("free-a", now).unwrap();

        let record = tracker.peek("free-a", day("2025-06-10"));
        assert_eq!(record.requests_used, 0);
        assert_eq!(record.tokens_used, 0);
        assert!(record.cooldown_until.is_none());
        assert_eq!(record.last_failure, Some(now));
    }

    #[test]
    fn test_peek_does_not_create_records() {
        let tracker = UsageTracker::in_memory();
        let record = tracker.peek("never-seen", day("2025-06-10"));
        assert_eq!(record.requests_used, 0);
        assert!(tracker.records.is_empty());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker-state.json");
        let now = at("2025-06-10T12:00:00Z");

        {
            let mut tracker = UsageTracker::load(&path).unwrap();
            tracker.record_success("free-a", 1234, now).unwrap();
            tracker
                .record_rate_limited("free-b", Duration::from_secs(600), now)
                .unwrap();
        }

        let tracker = UsageTracker::load(&path).unwrap();
        let a = tracker.peek("free-a", day("2025-06-10"));
        assert_eq!(a.requests_used, 1);
        assert_eq!(a.tokens_used, 1234);

        let b = tracker.peek("free-b", day("2025-06-10"));
        assert!(b.in_cooldown(at("2025-06-10T12:05:00Z")));
    }

    #[test]
    fn test_load_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = UsageTracker::load(dir.path().join("nope.json")).unwrap();
        assert!(tracker.records.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker-state.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            UsageTracker::load(&path),
            Err(LexError::Storage(_))
        ));
    }
}
