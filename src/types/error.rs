//! Unified Error Type System
//!
//! Centralized error types for the whole crate, with classification of
//! provider failures into categories the router can act on.
//!
//! ## Error Categories
//!
//! - **RateLimit**: provider signalled 429-class throttling (cooldown, fail over)
//! - **Timeout**: bounded call exceeded its deadline (fail over)
//! - **Network**: connectivity issues (fail over)
//! - **Malformed**: response could not be decoded (fail over)
//! - **Auth**: credential failures (fail over, but worth a loud log)
//! - **Unavailable**: 5xx-class server trouble (fail over)
//!
//! Failures local to one provider never escape the router; only exhaustion
//! of an entire profile is surfaced to callers.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Categories of provider call failures, used for failover decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - put the provider on cooldown, try the next
    RateLimit,
    /// Request exceeded its deadline
    Timeout,
    /// Network/connectivity issues
    Network,
    /// Response body could not be decoded
    Malformed,
    /// Authentication failed
    Auth,
    /// Provider-side server error (5xx)
    Unavailable,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Network => write!(f, "NETWORK"),
            Self::Malformed => write!(f, "MALFORMED"),
            Self::Auth => write!(f, "AUTH"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Rate-limit-class failures trigger a cooldown on the provider;
    /// everything else only stamps a failure timestamp.
    pub fn triggers_cooldown(&self) -> bool {
        matches!(self, Self::RateLimit)
    }
}

// =============================================================================
// Provider Error
// =============================================================================

/// A classified failure from one provider call.
#[derive(Debug, Clone)]
pub struct ProviderError {
    /// Category for the router's cooldown/failover decision
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Wait hint parsed from a Retry-After header; overrides the
    /// provider's configured cooldown when present
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Attach a wait hint from the provider's Retry-After header
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn is_rate_limit(&self) -> bool {
        self.category.triggers_cooldown()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Classifies raw provider failures into [`ProviderError`]s.
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider.
    pub fn classify(message: &str, provider: &str) -> ProviderError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return ProviderError::with_provider(ErrorCategory::RateLimit, message, provider);
        }

        if lower.contains("timeout") || lower.contains("timed out") || lower.contains("deadline") {
            return ProviderError::with_provider(ErrorCategory::Timeout, message, provider);
        }

        if lower.contains("auth")
            || lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("unauthorized")
        {
            return ProviderError::with_provider(ErrorCategory::Auth, message, provider);
        }

        if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("unreachable")
        {
            return ProviderError::with_provider(ErrorCategory::Network, message, provider);
        }

        if lower.contains("503")
            || lower.contains("502")
            || lower.contains("500")
            || lower.contains("service unavailable")
            || lower.contains("server error")
            || lower.contains("overloaded")
        {
            return ProviderError::with_provider(ErrorCategory::Unavailable, message, provider);
        }

        if lower.contains("parse")
            || lower.contains("json")
            || lower.contains("malformed")
            || lower.contains("no content")
        {
            return ProviderError::with_provider(ErrorCategory::Malformed, message, provider);
        }

        ProviderError::with_provider(ErrorCategory::Unknown, message, provider)
    }

    /// Classify an HTTP status code directly (more accurate than string matching).
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> ProviderError {
        match status {
            429 => ProviderError::with_provider(ErrorCategory::RateLimit, message, provider),
            401 | 403 => ProviderError::with_provider(ErrorCategory::Auth, message, provider),
            500 | 502 | 503 | 504 => {
                ProviderError::with_provider(ErrorCategory::Unavailable, message, provider)
            }
            408 => ProviderError::with_provider(ErrorCategory::Timeout, message, provider),
            _ => ProviderError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }
}

// =============================================================================
// Exhaustion Diagnostics
// =============================================================================

/// Why one provider could not serve a request - either a skip reason
/// (cooldown, over limit) or a classified call failure.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

fn fmt_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum LexError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Router Errors
    // -------------------------------------------------------------------------
    /// The requested profile is not declared in the configuration.
    /// Fatal to the calling script.
    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    /// A single provider call failed. Absorbed by the router's failover
    /// loop; surfaced only through [`LexError::AllProvidersExhausted`].
    #[error("provider error: {0}")]
    Provider(ProviderError),

    /// Every provider in the profile was skipped or failed.
    /// Terminal for one `call()` invocation; the caller decides whether
    /// to retry on its next scheduled run.
    #[error("all providers exhausted for profile '{profile}': {}", fmt_failures(failures))]
    AllProvidersExhausted {
        profile: String,
        failures: Vec<ProviderFailure>,
    },

    // -------------------------------------------------------------------------
    // Governor Errors
    // -------------------------------------------------------------------------
    /// The CI-minutes source could not be queried. The governor degrades
    /// to a zero-usage estimate for the check rather than blocking.
    #[error("minutes estimation failed: {0}")]
    GovernorEstimation(String),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<ProviderError> for LexError {
    fn from(err: ProviderError) -> Self {
        LexError::Provider(err)
    }
}

pub type Result<T> = std::result::Result<T, LexError>;

impl LexError {
    /// Per-provider failure list when the error is an exhaustion, for
    /// diagnosis in CI logs.
    pub fn exhaustion_failures(&self) -> Option<&[ProviderFailure]> {
        match self {
            Self::AllProvidersExhausted { failures, .. } => Some(failures),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
