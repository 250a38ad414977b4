//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Router and tracker constants
pub mod router {
    /// Default per-provider request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Default cooldown after a rate-limit response (seconds)
    pub const DEFAULT_COOLDOWN_SECS: u64 = 3600;

    /// Default per-day request limit when a profile omits one
    pub const DEFAULT_REQUESTS_PER_DAY: u32 = 50;

    /// Default per-day token limit when a profile omits one
    pub const DEFAULT_TOKENS_PER_DAY: u64 = 500_000;

    /// Rough chars-per-token divisor used when a provider reports no usage
    pub const CHARS_PER_TOKEN: usize = 4;
}

/// Usage governor constants (GitHub Actions free tier)
pub mod governor {
    /// Monthly CI minutes budget
    pub const MONTHLY_BUDGET_MINUTES: f64 = 2000.0;

    /// Above this fraction of budget, non-essential workflows are shed
    pub const WARNING_THRESHOLD: f64 = 0.80;

    /// Above this fraction of budget, everything is denied
    pub const CRITICAL_THRESHOLD: f64 = 0.95;

    /// Minimum age of the stored estimate before re-querying the CI API (seconds)
    pub const REFRESH_INTERVAL_SECS: i64 = 3600;

    /// Workflows that keep running until the critical threshold
    pub const ESSENTIAL_WORKFLOWS: &[&str] = &["generate"];

    /// Pagination cap when listing workflow runs
    pub const MAX_RUN_PAGES: u32 = 10;
}

/// Term verification constants
pub mod verify {
    /// Profile name the verifier calls through
    pub const PROFILE: &str = "verify";

    /// Low temperature - classification, not creativity
    pub const TEMPERATURE: f32 = 0.1;

    /// Verdict plus one explanation sentence fits comfortably
    pub const MAX_TOKENS: u32 = 300;

    /// How much raw text to quote back when a response is unparseable
    pub const RAW_SNIPPET_LEN: usize = 200;
}
