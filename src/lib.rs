//! Lexibot - Automation Core for the AI Dictionary
//!
//! The plumbing behind a self-maintaining glossary: scheduled CI jobs
//! call into this crate to route LLM requests across free-tier providers,
//! stay inside a monthly CI-minutes budget, and screen candidate terms
//! for overlap before they enter the corpus.
//!
//! ## Core Features
//!
//! - **Provider Routing**: ordered failover across profiles of
//!   OpenAI-compatible endpoints, with persistent per-provider daily
//!   request/token accounting and rate-limit cooldowns
//! - **Usage Governor**: admission control against the GitHub Actions
//!   free-tier minutes budget, with warning and critical thresholds
//! - **Term Verifier**: LLM-based duplicate/overlap detection that fails
//!   open - verification outages never block generation
//!
//! ## Quick Start
//!
//! ```ignore
//! use lexibot::config::ConfigLoader;
//! use lexibot::router::{ChatMessage, ChatRequest, LlmRouter};
//!
//! let config = ConfigLoader::load()?;
//! let mut router = LlmRouter::new(&config)?;
//! let request = ChatRequest::new(vec![ChatMessage::user("...")], 0.9, 8000);
//! let result = router.call("generate", &request).await?;
//! println!("{} via {}", result.display_model(), result.provider);
//! ```
//!
//! ## Modules
//!
//! - [`router`]: provider abstraction, failover, usage tracking
//! - [`governor`]: CI-minutes budget admission control
//! - [`verifier`]: corpus compaction and verdict parsing
//! - [`config`]: Figment-based configuration resolution

pub mod cli;
pub mod config;
pub mod constants;
pub mod governor;
pub mod router;
pub mod types;
pub mod verifier;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, GovernorSettings, ProviderSpec};

// Error Types
pub use types::{ErrorCategory, LexError, ProviderFailure, Result};

// =============================================================================
// Router Re-exports
// =============================================================================

pub use router::{
    CallResult, ChatMessage, ChatProvider, ChatRequest, LlmRouter, ProviderAvailability,
    UsageTracker,
};

// =============================================================================
// Governor Re-exports
// =============================================================================

pub use governor::{GovernorDecision, MinutesSource, UsageGovernor};

// =============================================================================
// Verifier Re-exports
// =============================================================================

pub use types::{CompactTerm, Verdict};
pub use verifier::{Verification, load_compact_terms, verify_term};
