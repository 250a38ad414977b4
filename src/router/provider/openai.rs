//! OpenAI-Compatible Chat Provider
//!
//! Covers every backend the profiles file lists: OpenRouter, Mistral's
//! La Plateforme, and Gemini's OpenAI-compatible surface all speak the
//! same chat completions dialect.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatProvider, ChatRequest, ProviderOutput};
use crate::config::ProviderSpec;
use crate::types::{ErrorCategory, ErrorClassifier, ProviderError, Result};

/// OpenAI-style chat completions provider with secure API key handling.
pub struct OpenAiCompatProvider {
    name: String,
    /// API key stored securely - never exposed in logs or debug output
    api_key: Option<SecretString>,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.name)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiCompatProvider {
    pub fn new(spec: &ProviderSpec) -> Result<Self> {
        // A missing key is not a construction error: free endpoints accept
        // anonymous calls, and a keyless paid endpoint fails over cleanly
        // with an AUTH-classified error at call time.
        let api_key = spec.api_key_env.as_deref().and_then(|var| {
            let key = std::env::var(var).ok().map(SecretString::from);
            if key.is_none() {
                warn!(provider = %spec.name, env = var, "API key env var not set");
            }
            key
        });

        let client = reqwest::Client::builder()
            .timeout(spec.timeout())
            .build()
            .map_err(|e| {
                crate::types::LexError::Config(format!(
                    "failed to create HTTP client for '{}': {}",
                    spec.name, e
                ))
            })?;

        Ok(Self {
            name: spec.name.clone(),
            api_key,
            api_base: spec.api_base.clone(),
            model: spec.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ProviderOutput> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: request.messages.clone(),
            temperature: request.temperature,
            max_tokens: Some(request.max_tokens),
        };

        debug!(provider = %self.name, model = %self.model, "Sending chat request");

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify(&e.to_string(), &self.name))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            let message = format!("API error ({}): {}", status, truncate(&body, 300));
            let mut err = ErrorClassifier::classify_http_status(status, &message, &self.name);
            if let Some(wait) = retry_after {
                err = err.retry_after(wait);
            }
            return Err(err.into());
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            ProviderError::with_provider(
                ErrorCategory::Malformed,
                format!("failed to decode response: {}", e),
                &self.name,
            )
        })?;

        let text = completion
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                ProviderError::with_provider(
                    ErrorCategory::Malformed,
                    "no content in response",
                    &self.name,
                )
            })?;

        let model = completion.model.unwrap_or_else(|| self.model.clone());
        let reported_tokens = completion.usage.map(|u| u.total_tokens);

        Ok(ProviderOutput {
            text,
            model,
            reported_tokens,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Retry-After in delta-seconds form; the HTTP-date form is rare on
/// these endpoints and falls back to the configured cooldown.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<super::ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("600"), Some(Duration::from_secs(600)));
        assert_eq!(parse_retry_after(" 30 "), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2025 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after(""), None);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("hi", 10), "hi");
        // Multi-byte chars must not be split
        assert_eq!(truncate("héllo", 2), "hé");
    }

    #[test]
    fn test_response_decoding() {
        let raw = r#"{
            "choices": [{"message": {"content": "GENERATE: fills a gap"}}],
            "model": "test/model:free",
            "usage": {"prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("GENERATE: fills a gap")
        );
        assert_eq!(parsed.usage.unwrap().total_tokens, 150);
    }

    #[test]
    fn test_response_without_usage_decodes() {
        let raw = r#"{"choices": [{"message": {"content": "ok"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.usage.is_none());
        assert!(parsed.model.is_none());
    }
}
