//! LLM Provider Routing Layer
//!
//! Ordered failover over a profile's provider list, with a persistent
//! per-provider circuit: cooldowns after rate limits, daily request and
//! token limits checked before every attempt.
//!
//! ## Strategy
//!
//! 1. Resolve the profile to its ordered provider list
//! 2. Skip providers in cooldown or over a daily limit
//! 3. Issue the request with a bounded timeout
//! 4. First success wins - account usage and return immediately
//! 5. Rate limits start a cooldown, other failures stamp a timestamp;
//!    either way, fall through to the next provider
//! 6. Exhaustion of the whole profile surfaces with per-provider reasons
//!
//! A provider is never retried within one `call()` invocation; outer
//! retry loops belong to the caller.

pub mod provider;
mod tracker;

pub use provider::{
    ChatMessage, ChatProvider, ChatRequest, OpenAiCompatProvider, ProviderOutput,
    SharedChatProvider, create_provider, estimate_tokens,
};
pub use tracker::{UsageRecord, UsageTracker};

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::config::{Config, ProviderSpec};
use crate::types::{LexError, ProviderFailure, Result};

// =============================================================================
// Call Result
// =============================================================================

/// Normalized response from a routed call.
#[derive(Debug, Clone)]
pub struct CallResult {
    /// Free-form response text
    pub text: String,
    /// Model id the call resolved to
    pub model: String,
    /// Provider that served the call
    pub provider: String,
}

impl CallResult {
    /// Human-readable model name for attribution lines:
    /// `openrouter/foo-bar:free` becomes `Foo Bar`.
    pub fn display_model(&self) -> String {
        let tail = self.model.rsplit('/').next().unwrap_or(&self.model);
        let tail = tail.strip_suffix(":free").unwrap_or(tail);
        tail.split('-')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// =============================================================================
// Availability Report
// =============================================================================

/// Read-only availability of one provider, reported without making a call.
#[derive(Debug, Clone)]
pub struct ProviderAvailability {
    pub name: String,
    pub model: String,
    pub is_available: bool,
    /// Why the provider is unusable, when it is
    pub reason: Option<String>,
}

// =============================================================================
// LLM Router
// =============================================================================

/// Multi-provider failover router with persistent rate-limit tracking.
///
/// Owns the profile store and the usage tracker exclusively; construct one
/// per process.
pub struct LlmRouter {
    profiles: BTreeMap<String, Vec<ProviderSpec>>,
    providers: HashMap<String, SharedChatProvider>,
    tracker: UsageTracker,
}

impl LlmRouter {
    /// Build a router from configuration, loading the tracker snapshot
    /// from the configured path. All providers are constructed up front,
    /// so misconfiguration surfaces at startup rather than at first use.
    pub fn new(config: &Config) -> Result<Self> {
        let tracker = UsageTracker::load(&config.paths.tracker_file)?;
        Self::with_tracker(config, tracker)
    }

    /// Build a router with an explicit tracker (in-memory for tests).
    pub fn with_tracker(config: &Config, tracker: UsageTracker) -> Result<Self> {
        let mut providers: HashMap<String, SharedChatProvider> = HashMap::new();
        for specs in config.profiles.values() {
            for spec in specs {
                if !providers.contains_key(&spec.name) {
                    providers.insert(spec.name.clone(), create_provider(spec)?);
                }
            }
        }

        Ok(Self {
            profiles: config.profiles.clone(),
            providers,
            tracker,
        })
    }

    /// Test seam: inject provider implementations directly.
    pub fn with_providers(
        profiles: BTreeMap<String, Vec<ProviderSpec>>,
        providers: HashMap<String, SharedChatProvider>,
        tracker: UsageTracker,
    ) -> Self {
        Self {
            profiles,
            providers,
            tracker,
        }
    }

    /// Route a chat request through the named profile.
    ///
    /// Returns the first successful provider's normalized result, or
    /// [`LexError::AllProvidersExhausted`] carrying every provider's skip
    /// or failure reason.
    pub async fn call(&mut self, profile: &str, request: &ChatRequest) -> Result<CallResult> {
        self.call_at(profile, request, Utc::now()).await
    }

    /// [`Self::call`] with an explicit clock, for deterministic tests.
    pub async fn call_at(
        &mut self,
        profile: &str,
        request: &ChatRequest,
        now: DateTime<Utc>,
    ) -> Result<CallResult> {
        let specs = self
            .profiles
            .get(profile)
            .ok_or_else(|| LexError::UnknownProfile(profile.to_string()))?
            .clone();

        let mut failures: Vec<ProviderFailure> = Vec::new();

        for spec in &specs {
            let record = self.tracker.get(&spec.name, now.date_naive());

            if let Some(reason) = unavailable_reason(spec, &record, now) {
                debug!(provider = %spec.name, %reason, "Skipping provider");
                failures.push(ProviderFailure {
                    provider: spec.name.clone(),
                    reason,
                });
                continue;
            }

            let provider = self.providers.get(&spec.name).ok_or_else(|| {
                LexError::Config(format!("no provider instance for '{}'", spec.name))
            })?;

            info!(profile, provider = %spec.name, model = %spec.model, "Calling provider");

            match provider.chat(request).await {
                Ok(output) => {
                    let tokens = output.reported_tokens.unwrap_or_else(|| {
                        estimate_tokens(request.prompt_chars() + output.text.len())
                    });
                    self.tracker.record_success(&spec.name, tokens, now)?;

                    info!(
                        profile,
                        provider = %spec.name,
                        model = %output.model,
                        tokens,
                        "Call succeeded"
                    );

                    return Ok(CallResult {
                        text: output.text,
                        model: output.model,
                        provider: spec.name.clone(),
                    });
                }
                Err(LexError::Provider(perr)) if perr.is_rate_limit() => {
                    // A Retry-After hint from the provider overrides the
                    // configured cooldown
                    let cooldown = perr.retry_after.unwrap_or_else(|| spec.cooldown());
                    warn!(provider = %spec.name, error = %perr, ?cooldown, "Rate limited, starting cooldown");
                    self.tracker
                        .record_rate_limited(&spec.name, cooldown, now)?;
                    failures.push(ProviderFailure {
                        provider: spec.name.clone(),
                        reason: perr.to_string(),
                    });
                }
                Err(err) => {
                    warn!(provider = %spec.name, error = %err, "Provider failed, trying next");
                    self.tracker.record_failure(&spec.name, now)?;
                    failures.push(ProviderFailure {
                        provider: spec.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        Err(LexError::AllProvidersExhausted {
            profile: profile.to_string(),
            failures,
        })
    }

    /// Report per-provider availability for a profile without making any
    /// call and without persisting anything.
    pub fn list_available(&self, profile: &str) -> Result<Vec<ProviderAvailability>> {
        self.list_available_at(profile, Utc::now())
    }

    /// [`Self::list_available`] with an explicit clock.
    pub fn list_available_at(
        &self,
        profile: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProviderAvailability>> {
        let specs = self
            .profiles
            .get(profile)
            .ok_or_else(|| LexError::UnknownProfile(profile.to_string()))?;

        Ok(specs
            .iter()
            .map(|spec| {
                let record = self.tracker.peek(&spec.name, now.date_naive());
                let reason = unavailable_reason(spec, &record, now);
                ProviderAvailability {
                    name: spec.name.clone(),
                    model: spec.model.clone(),
                    is_available: reason.is_none(),
                    reason,
                }
            })
            .collect())
    }

    /// Declared profile names, sorted.
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

/// Why a provider cannot serve a request right now, if it cannot.
fn unavailable_reason(
    spec: &ProviderSpec,
    record: &UsageRecord,
    now: DateTime<Utc>,
) -> Option<String> {
    if record.in_cooldown(now) {
        let until = record
            .cooldown_until
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        return Some(format!("in cooldown until {}", until));
    }
    if record.requests_used >= spec.requests_per_day {
        return Some(format!(
            "daily request limit reached ({}/{})",
            record.requests_used, spec.requests_per_day
        ));
    }
    if record.tokens_used >= spec.tokens_per_day {
        return Some(format!(
            "daily token limit reached ({}/{})",
            record.tokens_used, spec.tokens_per_day
        ));
    }
    None
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::types::{ErrorCategory, ProviderError};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct MockProvider {
        name: String,
        model: String,
        outcome: MockOutcome,
        calls: AtomicU32,
    }

    enum MockOutcome {
        Succeed { tokens: Option<u64> },
        RateLimit { retry_after: Option<Duration> },
        Fail,
    }

    impl MockProvider {
        fn new(name: &str, outcome: MockOutcome) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                model: format!("test/{}:free", name),
                outcome,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for MockProvider {
        async fn chat(&self, _request: &ChatRequest) -> Result<ProviderOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                MockOutcome::Succeed { tokens } => Ok(ProviderOutput {
                    text: format!("response from {}", self.name),
                    model: self.model.clone(),
                    reported_tokens: *tokens,
                }),
                MockOutcome::RateLimit { retry_after } => {
                    let mut err = ProviderError::with_provider(
                        ErrorCategory::RateLimit,
                        "429 too many requests",
                        &self.name,
                    );
                    if let Some(wait) = retry_after {
                        err = err.retry_after(*wait);
                    }
                    Err(err.into())
                }
                MockOutcome::Fail => Err(ProviderError::with_provider(
                    ErrorCategory::Network,
                    "connection refused",
                    &self.name,
                )
                .into()),
            }
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &str {
            &self.model
        }
    }

    fn spec(name: &str) -> ProviderSpec {
        ProviderSpec {
            name: name.to_string(),
            kind: ProviderKind::OpenaiCompatible,
            model: format!("test/{}:free", name),
            api_base: "https://example.invalid/v1".to_string(),
            api_key_env: None,
            requests_per_day: 10,
            tokens_per_day: 100_000,
            cooldown_secs: 3600,
            timeout_secs: 120,
        }
    }

    fn router_with(
        providers: Vec<Arc<MockProvider>>,
        specs: Vec<ProviderSpec>,
        tracker: UsageTracker,
    ) -> LlmRouter {
        let mut profiles = BTreeMap::new();
        profiles.insert("generate".to_string(), specs);
        let map: HashMap<String, SharedChatProvider> = providers
            .into_iter()
            .map(|p| (p.name.clone(), p as SharedChatProvider))
            .collect();
        LlmRouter::with_providers(profiles, map, tracker)
    }

    fn request() -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user("hello")], 0.7, 100)
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_first_provider_wins() {
        let a = MockProvider::new("free-a", MockOutcome::Succeed { tokens: Some(100) });
        let b = MockProvider::new("free-b", MockOutcome::Succeed { tokens: Some(100) });
        let mut router = router_with(
            vec![a.clone(), b.clone()],
            vec![spec("free-a"), spec("free-b")],
            UsageTracker::in_memory(),
        );

        let result = router.call("generate", &request()).await.unwrap();
        assert_eq!(result.provider, "free-a");
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failover_stops_at_first_success() {
        // A rate limited, B succeeds, C must never be attempted
        let a = MockProvider::new("free-a", MockOutcome::RateLimit { retry_after: None });
        let b = MockProvider::new("free-b", MockOutcome::Succeed { tokens: Some(50) });
        let c = MockProvider::new("free-c", MockOutcome::Succeed { tokens: Some(50) });
        let mut router = router_with(
            vec![a.clone(), b.clone(), c.clone()],
            vec![spec("free-a"), spec("free-b"), spec("free-c")],
            UsageTracker::in_memory(),
        );

        let result = router.call("generate", &request()).await.unwrap();
        assert_eq!(result.provider, "free-b");
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_starts_cooldown() {
        let a = MockProvider::new("free-a", MockOutcome::RateLimit { retry_after: None });
        let b = MockProvider::new("free-b", MockOutcome::Succeed { tokens: Some(50) });
        let now = at("2025-06-10T12:00:00Z");
        let mut router = router_with(
            vec![a.clone(), b],
            vec![spec("free-a"), spec("free-b")],
            UsageTracker::in_memory(),
        );

        router.call_at("generate", &request(), now).await.unwrap();

        // Second call the same hour: A is skipped without an attempt
        let later = at("2025-06-10T12:30:00Z");
        router.call_at("generate", &request(), later).await.unwrap();
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);

        // After the cooldown expires A is tried again
        let next_day = at("2025-06-11T12:00:00Z");
        let _ = router.call_at("generate", &request(), next_day).await;
        assert_eq!(a.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_after_hint_overrides_configured_cooldown() {
        // Spec cooldown is 3600s; the provider asks for 600s
        let a = MockProvider::new(
            "free-a",
            MockOutcome::RateLimit {
                retry_after: Some(Duration::from_secs(600)),
            },
        );
        let b = MockProvider::new("free-b", MockOutcome::Succeed { tokens: Some(50) });
        let now = at("2025-06-10T12:00:00Z");
        let mut router = router_with(
            vec![a, b],
            vec![spec("free-a"), spec("free-b")],
            UsageTracker::in_memory(),
        );

        router.call_at("generate", &request(), now).await.unwrap();

        let record = router.tracker.peek("free-a", now.date_naive());
        assert_eq!(
            record.cooldown_until,
            Some(now + chrono::Duration::seconds(600))
        );
    }

    #[tokio::test]
    async fn test_exhaustion_without_network_calls() {
        // Both providers over their request limit: no attempt may be made
        let a = MockProvider::new("free-a", MockOutcome::Succeed { tokens: None });
        let b = MockProvider::new("free-b", MockOutcome::Succeed { tokens: None });
        let now = at("2025-06-10T12:00:00Z");

        let mut tracker = UsageTracker::in_memory();
        for _ in 0..10 {
            tracker.record_success("free-a", 10, now).unwrap();
            tracker.record_success("free-b", 10, now).unwrap();
        }

        let mut router = router_with(
            vec![a.clone(), b.clone()],
            vec![spec("free-a"), spec("free-b")],
            tracker,
        );

        let err = router
            .call_at("generate", &request(), now)
            .await
            .unwrap_err();

        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);

        let failures = err.exhaustion_failures().expect("exhaustion error");
        assert_eq!(failures.len(), 2);
        assert!(failures[0].reason.contains("request limit"));
    }

    #[tokio::test]
    async fn test_day_reset_restores_exhausted_provider() {
        // freeA at 10/10 requests yesterday must be fully available today
        let a = MockProvider::new("free-a", MockOutcome::Succeed { tokens: Some(42) });
        let yesterday = at("2025-06-10T12:00:00Z");

        let mut tracker = UsageTracker::in_memory();
        for _ in 0..10 {
            tracker.record_success("free-a", 10, yesterday).unwrap();
        }

        let mut router = router_with(vec![a.clone()], vec![spec("free-a")], tracker);

        let today = at("2025-06-11T08:00:00Z");
        let result = router.call_at("generate", &request(), today).await.unwrap();
        assert_eq!(result.provider, "free-a");
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_profile() {
        let mut router = router_with(vec![], vec![], UsageTracker::in_memory());
        let err = router.call("nope", &request()).await.unwrap_err();
        assert!(matches!(err, LexError::UnknownProfile(_)));
    }

    #[tokio::test]
    async fn test_token_estimation_when_unreported() {
        let a = MockProvider::new("free-a", MockOutcome::Succeed { tokens: None });
        let now = at("2025-06-10T12:00:00Z");
        let mut router = router_with(vec![a], vec![spec("free-a")], UsageTracker::in_memory());

        router.call_at("generate", &request(), now).await.unwrap();

        let availability = router.list_available_at("generate", now).unwrap();
        assert!(availability[0].is_available);
        // "hello" (5) + "response from free-a" (20) = 25 chars -> 6 tokens
        let record = router.tracker.peek("free-a", now.date_naive());
        assert_eq!(record.tokens_used, 6);
        assert_eq!(record.requests_used, 1);
    }

    #[tokio::test]
    async fn test_list_available_reports_reasons() {
        let now = at("2025-06-10T12:00:00Z");
        let mut tracker = UsageTracker::in_memory();
        tracker
            .record_rate_limited("free-a", Duration::from_secs(3600), now)
            .unwrap();

        let router = router_with(
            vec![
                MockProvider::new("free-a", MockOutcome::Fail),
                MockProvider::new("free-b", MockOutcome::Succeed { tokens: None }),
            ],
            vec![spec("free-a"), spec("free-b")],
            tracker,
        );

        let report = router.list_available_at("generate", now).unwrap();
        assert!(!report[0].is_available);
        assert!(report[0].reason.as_deref().unwrap().contains("cooldown"));
        assert!(report[1].is_available);
        assert!(report[1].reason.is_none());
    }

    #[tokio::test]
    async fn test_all_failures_listed_on_exhaustion() {
        let a = MockProvider::new("free-a", MockOutcome::RateLimit { retry_after: None });
        let b = MockProvider::new("free-b", MockOutcome::Fail);
        let mut router = router_with(
            vec![a, b],
            vec![spec("free-a"), spec("free-b")],
            UsageTracker::in_memory(),
        );

        let err = router.call("generate", &request()).await.unwrap_err();
        let failures = err.exhaustion_failures().unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].provider, "free-a");
        assert_eq!(failures[1].provider, "free-b");
    }

    #[test]
    fn test_display_model() {
        let result = CallResult {
            text: String::new(),
            model: "openrouter/some-model:free".to_string(),
            provider: "openrouter-free".to_string(),
        };
        assert_eq!(result.display_model(), "Some Model");

        let plain = CallResult {
            text: String::new(),
            model: "mistral-small".to_string(),
            provider: "mistral".to_string(),
        };
        assert_eq!(plain.display_model(), "Mistral Small");
    }
}
