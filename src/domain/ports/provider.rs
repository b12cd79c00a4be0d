//! Generative provider port.
//!
//! Abstracts the generative backends the orchestrator can talk to. The
//! orchestrator decides primary/secondary routing by inspecting the error
//! variant returned here; providers never retry on their own.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::{ChatMessage, TokenUsage};

/// A completion request sent to a generative backend.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt, when the backend supports one
    pub system: Option<String>,

    /// Conversation turns, oldest first
    pub messages: Vec<ChatMessage>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature (0.0 - 1.0)
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Single-turn request with a system prompt.
    pub fn single_turn(system: impl Into<String>, user: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: Some(system.into()),
            messages: vec![ChatMessage::user(user)],
            max_tokens,
            temperature: Some(0.2),
        }
    }
}

/// Raw completion returned by a provider, before schema normalization.
#[derive(Debug, Clone)]
pub struct ProviderCompletion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Errors from generative provider calls.
///
/// Every variant names the provider so fallback decisions and response
/// provenance stay attributable.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid request to {provider}: {message}")]
    InvalidRequest { provider: String, message: String },

    #[error("Authentication failed for {provider}")]
    AuthenticationFailed { provider: String },

    #[error("Rate limit exceeded on {provider}")]
    RateLimitExceeded { provider: String },

    #[error("Quota exhausted on {provider}")]
    QuotaExhausted { provider: String },

    #[error("{provider} server error (HTTP {status}): {message}")]
    ServerError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} overloaded")]
    Overloaded { provider: String },

    #[error("Network error talking to {provider}: {message}")]
    Network { provider: String, message: String },

    #[error("Timed out waiting for {provider} after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    #[error("Malformed response from {provider}: {message}")]
    Serialization { provider: String, message: String },

    #[error("Unknown error from {provider} (HTTP {status}): {message}")]
    Unknown {
        provider: String,
        status: u16,
        message: String,
    },
}

impl ProviderError {
    /// The provider this error came from.
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::InvalidRequest { provider, .. }
            | ProviderError::AuthenticationFailed { provider }
            | ProviderError::RateLimitExceeded { provider }
            | ProviderError::QuotaExhausted { provider }
            | ProviderError::ServerError { provider, .. }
            | ProviderError::Overloaded { provider }
            | ProviderError::Network { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::Serialization { provider, .. }
            | ProviderError::Unknown { provider, .. } => provider,
        }
    }

    /// True when the orchestrator may retry this failure once on the
    /// secondary provider. Only rate-limit and quota failures qualify;
    /// everything else propagates unmodified.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimitExceeded { .. } | ProviderError::QuotaExhausted { .. }
        )
    }
}

/// Port trait for generative backends.
///
/// Implementations must be `Send + Sync`: provider clients are constructed
/// once at process start and shared across requests.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Stable identifier, e.g. "anthropic" or "openai".
    fn provider_id(&self) -> &str;

    /// Model identifier sent with requests.
    fn model(&self) -> &str;

    /// Execute a completion request.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<ProviderCompletion, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_eligibility() {
        let rate = ProviderError::RateLimitExceeded {
            provider: "anthropic".to_string(),
        };
        assert!(rate.is_fallback_eligible());

        let quota = ProviderError::QuotaExhausted {
            provider: "openai".to_string(),
        };
        assert!(quota.is_fallback_eligible());

        let auth = ProviderError::AuthenticationFailed {
            provider: "anthropic".to_string(),
        };
        assert!(!auth.is_fallback_eligible());

        let server = ProviderError::ServerError {
            provider: "anthropic".to_string(),
            status: 500,
            message: "boom".to_string(),
        };
        assert!(!server.is_fallback_eligible());

        let overloaded = ProviderError::Overloaded {
            provider: "anthropic".to_string(),
        };
        assert!(!overloaded.is_fallback_eligible());
    }

    #[test]
    fn test_provider_attribution() {
        let err = ProviderError::Timeout {
            provider: "openai".to_string(),
            seconds: 60,
        };
        assert_eq!(err.provider(), "openai");
        assert_eq!(err.to_string(), "Timed out waiting for openai after 60s");
    }
}
