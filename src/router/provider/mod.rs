//! Provider Abstraction
//!
//! Defines the ChatProvider trait - the seam between the router and the
//! outside network. Providers take a chat-style request and return raw
//! text plus metadata; all failure classification happens behind this
//! trait so the router only sees [`crate::types::ProviderError`] categories.

mod openai;

pub use openai::OpenAiCompatProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{ProviderKind, ProviderSpec};
use crate::constants::router as router_constants;
use crate::types::Result;

// =============================================================================
// Chat Request
// =============================================================================

/// One role-tagged message in a chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat-style request, provider-agnostic.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            messages,
            temperature,
            max_tokens,
        }
    }

    /// Total prompt length in characters, for token estimation when the
    /// provider reports no usage.
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.len()).sum()
    }
}

// =============================================================================
// Provider Output
// =============================================================================

/// Raw result of one successful provider call.
#[derive(Debug, Clone)]
pub struct ProviderOutput {
    /// Free-form response text
    pub text: String,
    /// Model id the provider resolved the request to
    pub model: String,
    /// Total tokens reported by the provider, when available
    pub reported_tokens: Option<u64>,
}

/// Rough token estimate used when a provider reports no usage.
pub fn estimate_tokens(chars: usize) -> u64 {
    (chars / router_constants::CHARS_PER_TOKEN) as u64
}

// =============================================================================
// Chat Provider Trait
// =============================================================================

/// One backend model endpoint. Implementations classify their own failures
/// into [`crate::types::ProviderError`] categories.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Issue the request with a bounded timeout.
    async fn chat(&self, request: &ChatRequest) -> Result<ProviderOutput>;

    /// Provider name for logging and tracker keys
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

/// Shared provider handle stored by the router.
pub type SharedChatProvider = Arc<dyn ChatProvider + Send + Sync>;

/// Create a provider from its spec. Kinds are validated at config load,
/// so this cannot fail on an unknown kind; it can fail on a bad HTTP
/// client configuration.
pub fn create_provider(spec: &ProviderSpec) -> Result<SharedChatProvider> {
    match spec.kind {
        ProviderKind::OpenaiCompatible => Ok(Arc::new(OpenAiCompatProvider::new(spec)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(0), 0);
        assert_eq!(estimate_tokens(4), 1);
        assert_eq!(estimate_tokens(4000), 1000);
    }

    #[test]
    fn test_prompt_chars_sums_all_messages() {
        let request = ChatRequest::new(
            vec![ChatMessage::system("abcd"), ChatMessage::user("efgh")],
            0.7,
            100,
        );
        assert_eq!(request.prompt_chars(), 8);
    }
}
