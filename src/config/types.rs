//! Configuration Types
//!
//! All configuration structures with sensible defaults. A configuration
//! declares named profiles (ordered provider lists), the persisted state
//! file locations, and the usage governor's budget policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::constants::{governor as governor_constants, router as router_constants};
use crate::types::{LexError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Persisted state and corpus locations
    pub paths: PathsConfig,

    /// Usage governor policy
    pub governor: GovernorSettings,

    /// Named profiles: ordered provider lists, first = most preferred
    pub profiles: BTreeMap<String, Vec<ProviderSpec>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            paths: PathsConfig::default(),
            governor: GovernorSettings::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `LexError::Config` on validation failure, so bad profiles
    /// fail at startup rather than at first use.
    pub fn validate(&self) -> Result<()> {
        for (name, providers) in &self.profiles {
            if providers.is_empty() {
                return Err(LexError::Config(format!(
                    "profile '{}' declares no providers",
                    name
                )));
            }
            for spec in providers {
                spec.validate(name)?;
            }
        }

        self.governor.validate()
    }

    /// Resolve a profile to its ordered provider list.
    pub fn profile(&self, name: &str) -> Option<&[ProviderSpec]> {
        self.profiles.get(name).map(Vec::as_slice)
    }
}

// =============================================================================
// Paths
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Usage tracker snapshot (one record per provider)
    pub tracker_file: PathBuf,

    /// Governor state (month label, minutes used, throttled flag)
    pub governor_state_file: PathBuf,

    /// Markdown corpus the verifier compacts per batch
    pub definitions_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tracker_file: PathBuf::from(".lexibot/tracker-state.json"),
            governor_state_file: PathBuf::from(".lexibot/usage-state.json"),
            definitions_dir: PathBuf::from("definitions"),
        }
    }
}

// =============================================================================
// Provider Specification
// =============================================================================

/// Supported provider backends. Validated at config load: an unknown kind
/// is a deserialization error, surfaced before any call is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// OpenAI-style chat completions endpoint (OpenRouter, Mistral,
    /// Gemini's OpenAI-compatible surface, ...)
    #[default]
    OpenaiCompatible,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenaiCompatible => write!(f, "openai-compatible"),
        }
    }
}

/// One backend model endpoint with its own rate/token limits and cooldown
/// behavior. Immutable once loaded; lifetime = process duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Provider name, used as the tracker key
    pub name: String,

    /// Backend kind
    #[serde(default)]
    pub kind: ProviderKind,

    /// Model identifier, e.g. "openrouter/some-model:free"
    pub model: String,

    /// Chat completions base URL
    pub api_base: String,

    /// Environment variable holding the API key; unset means anonymous
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Per-day request limit
    #[serde(default = "default_requests_per_day")]
    pub requests_per_day: u32,

    /// Per-day token limit
    #[serde(default = "default_tokens_per_day")]
    pub tokens_per_day: u64,

    /// Cooldown applied after a rate-limit response (seconds)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_requests_per_day() -> u32 {
    router_constants::DEFAULT_REQUESTS_PER_DAY
}

fn default_tokens_per_day() -> u64 {
    router_constants::DEFAULT_TOKENS_PER_DAY
}

fn default_cooldown_secs() -> u64 {
    router_constants::DEFAULT_COOLDOWN_SECS
}

fn default_timeout_secs() -> u64 {
    router_constants::DEFAULT_TIMEOUT_SECS
}

impl ProviderSpec {
    fn validate(&self, profile: &str) -> Result<()> {
        if self.name.is_empty() {
            return Err(LexError::Config(format!(
                "profile '{}' has a provider with an empty name",
                profile
            )));
        }
        if self.model.is_empty() {
            return Err(LexError::Config(format!(
                "provider '{}' in profile '{}' has no model",
                self.name, profile
            )));
        }
        if self.api_base.is_empty() {
            return Err(LexError::Config(format!(
                "provider '{}' in profile '{}' has no api_base",
                self.name, profile
            )));
        }
        if self.requests_per_day == 0 {
            return Err(LexError::Config(format!(
                "provider '{}': requests_per_day must be greater than 0",
                self.name
            )));
        }
        if self.tokens_per_day == 0 {
            return Err(LexError::Config(format!(
                "provider '{}': tokens_per_day must be greater than 0",
                self.name
            )));
        }
        if self.timeout_secs == 0 {
            return Err(LexError::Config(format!(
                "provider '{}': timeout_secs must be greater than 0",
                self.name
            )));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cooldown_secs)
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Governor Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorSettings {
    /// Monthly CI minutes budget
    pub monthly_budget_minutes: f64,

    /// Fraction of budget above which non-essential workflows are shed
    pub warning_threshold: f64,

    /// Fraction of budget above which all workflows are denied
    pub critical_threshold: f64,

    /// Minimum age of the stored estimate before re-querying (seconds)
    pub refresh_interval_secs: i64,

    /// Workflows that keep running until the critical threshold
    pub essential_workflows: Vec<String>,

    /// "owner/repo" for the CI minutes source; None disables the query
    /// (the governor then keeps whatever estimate is stored)
    pub repository: Option<String>,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            monthly_budget_minutes: governor_constants::MONTHLY_BUDGET_MINUTES,
            warning_threshold: governor_constants::WARNING_THRESHOLD,
            critical_threshold: governor_constants::CRITICAL_THRESHOLD,
            refresh_interval_secs: governor_constants::REFRESH_INTERVAL_SECS,
            essential_workflows: governor_constants::ESSENTIAL_WORKFLOWS
                .iter()
                .map(ToString::to_string)
                .collect(),
            repository: None,
        }
    }
}

impl GovernorSettings {
    pub fn validate(&self) -> Result<()> {
        if self.monthly_budget_minutes <= 0.0 {
            return Err(LexError::Config(format!(
                "monthly_budget_minutes must be positive, got {}",
                self.monthly_budget_minutes
            )));
        }
        if !(0.0..1.0).contains(&self.warning_threshold) {
            return Err(LexError::Config(format!(
                "warning_threshold must be between 0.0 and 1.0, got {}",
                self.warning_threshold
            )));
        }
        if self.critical_threshold <= self.warning_threshold || self.critical_threshold > 1.0 {
            return Err(LexError::Config(format!(
                "critical_threshold must be > warning ({}) and <= 1.0, got {}",
                self.warning_threshold, self.critical_threshold
            )));
        }
        Ok(())
    }

    pub fn is_essential(&self, workflow: &str) -> bool {
        self.essential_workflows.iter().any(|w| w == workflow)
    }
}

// =============================================================================
// Tests
// =============================================================================
