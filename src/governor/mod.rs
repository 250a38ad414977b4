//! Usage Governor
//!
//! Admission control over a monthly CI-minutes budget. Every scheduled
//! workflow asks the governor before doing real work; past the warning
//! threshold only essential workflows run, past the critical threshold
//! nothing does.
//!
//! The estimate is cached on disk and refreshed at most once per
//! interval, so governor checks themselves stay cheap. Estimation
//! failure degrades to a zero estimate with a warning: the governor
//! exists to save budget, not to become an outage of its own.

mod minutes;

pub use minutes::{GithubActionsMinutes, MinutesSource};

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{Config, GovernorSettings};
use crate::types::{LexError, Result};

// =============================================================================
// Persisted State
// =============================================================================

/// Governor snapshot, persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorState {
    /// Month label ("2025-06") the estimate belongs to
    pub month: String,
    /// Cached month-to-date minutes estimate
    pub minutes_used: f64,
    /// When the estimate was last refreshed
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
    /// Set on a denial; cleared only when usage drops back below the
    /// warning threshold. For dashboards only.
    #[serde(default)]
    pub throttled: bool,
}

impl GovernorState {
    fn fresh(month: String) -> Self {
        Self {
            month,
            minutes_used: 0.0,
            last_check: None,
            throttled: false,
        }
    }
}

// =============================================================================
// Decision
// =============================================================================

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GovernorDecision {
    /// Whether the workflow may run
    pub proceed: bool,
    /// Fraction of the monthly budget consumed (0.0 - 1.0+)
    pub usage_pct: f64,
    /// Month-to-date minutes estimate behind the decision
    pub minutes_used: f64,
}

// =============================================================================
// Usage Governor
// =============================================================================

/// Budget-aware admission controller for scheduled workflows.
pub struct UsageGovernor {
    settings: GovernorSettings,
    /// None disables persistence (in-memory mode for tests)
    state_path: Option<PathBuf>,
    state: GovernorState,
    /// None means no minutes source; the stored estimate is reused as-is
    source: Option<Box<dyn MinutesSource>>,
}

impl UsageGovernor {
    /// Build a governor from configuration, loading the state snapshot
    /// and wiring the GitHub Actions source when a repository is set.
    pub fn new(config: &Config) -> Result<Self> {
        let source: Option<Box<dyn MinutesSource>> = match &config.governor.repository {
            Some(repo) => Some(Box::new(GithubActionsMinutes::new(repo)?)),
            None => None,
        };

        let path = config.paths.governor_state_file.clone();
        let state = load_state(&path)?;

        Ok(Self {
            settings: config.governor.clone(),
            state_path: Some(path),
            state,
            source,
        })
    }

    /// In-memory governor with an injected source, for tests.
    pub fn with_source(settings: GovernorSettings, source: Option<Box<dyn MinutesSource>>) -> Self {
        let state = GovernorState::fresh(String::new());
        Self {
            settings,
            state_path: None,
            state,
            source,
        }
    }

    /// Decide whether `workflow` may run right now.
    pub async fn should_proceed(&mut self, workflow: &str) -> Result<GovernorDecision> {
        self.evaluate_at(workflow, Utc::now()).await
    }

    /// [`Self::should_proceed`] with an explicit clock, for deterministic
    /// tests.
    pub async fn evaluate_at(
        &mut self,
        workflow: &str,
        now: DateTime<Utc>,
    ) -> Result<GovernorDecision> {
        let month = now.format("%Y-%m").to_string();

        // Month rollover: the estimate belongs to the old month, start over
        if self.state.month != month {
            debug!(old = %self.state.month, new = %month, "Month rolled over, resetting state");
            self.state = GovernorState::fresh(month);
        }

        if self.estimate_is_stale(now) {
            self.refresh_estimate(now).await;
        }

        let usage_pct = self.state.minutes_used / self.settings.monthly_budget_minutes;
        let essential = self.settings.is_essential(workflow);

        // Inclusive boundaries: landing exactly on a threshold already
        // sheds load
        let proceed = if usage_pct >= self.settings.critical_threshold {
            false
        } else if usage_pct >= self.settings.warning_threshold {
            essential
        } else {
            true
        };

        if proceed {
            info!(
                workflow,
                usage_pct = format!("{:.1}%", usage_pct * 100.0),
                minutes = format!("{:.1}", self.state.minutes_used),
                "Workflow admitted"
            );
        } else {
            warn!(
                workflow,
                essential,
                usage_pct = format!("{:.1}%", usage_pct * 100.0),
                minutes = format!("{:.1}", self.state.minutes_used),
                "Workflow throttled"
            );
        }

        // An essential run admitted inside the warning band leaves the
        // stored flag as-is; only dropping below the warning threshold
        // clears it
        if !proceed {
            self.state.throttled = true;
        } else if usage_pct < self.settings.warning_threshold {
            self.state.throttled = false;
        }
        self.persist()?;

        Ok(GovernorDecision {
            proceed,
            usage_pct,
            minutes_used: self.state.minutes_used,
        })
    }

    fn estimate_is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.state.last_check {
            None => true,
            Some(checked) => (now - checked).num_seconds() >= self.settings.refresh_interval_secs,
        }
    }

    /// Re-query the minutes source. Failure is absorbed: the governor
    /// runs with a zero estimate rather than blocking every workflow on
    /// an API hiccup.
    async fn refresh_estimate(&mut self, now: DateTime<Utc>) {
        let Some(source) = &self.source else {
            return;
        };

        let month_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);

        match source.minutes_this_month(month_start).await {
            Ok(minutes) => {
                debug!(minutes = format!("{:.1}", minutes), "Refreshed minutes estimate");
                self.state.minutes_used = minutes;
            }
            Err(err) => {
                warn!(error = %err, "Minutes estimation failed, assuming zero usage");
                self.state.minutes_used = 0.0;
            }
        }
        self.state.last_check = Some(now);
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(&self.state)?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn load_state(path: &Path) -> Result<GovernorState> {
    if !path.exists() {
        return Ok(GovernorState::fresh(String::new()));
    }
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        LexError::Storage(format!(
            "corrupt governor snapshot {}: {}",
            path.display(),
            e
        ))
    })
}

// =============================================================================
// Tests
// =============================================================================
