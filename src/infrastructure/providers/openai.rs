//! OpenAI Chat Completions API client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::models::{ProviderConfig, TokenUsage};
use crate::domain::ports::{
    CompletionRequest, GenerativeProvider, ProviderCompletion, ProviderError,
};
use crate::infrastructure::providers::error;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const PROVIDER_ID: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// HTTP client for the OpenAI Chat Completions API.
///
/// The system prompt travels as a leading `system` message; otherwise the
/// wire shape mirrors the port's request directly.
pub struct OpenAiProvider {
    http_client: ReqwestClient,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
        })
    }

    /// Build a client from provider configuration, reading the API key
    /// from the configured environment variable.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let key_var = config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
        let api_key = std::env::var(key_var)
            .with_context(|| format!("Missing API key environment variable {key_var}"))?;
        Self::new(api_key, config.model.clone(), config.base_url.clone())
    }
}

#[async_trait]
impl GenerativeProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<ProviderCompletion, ProviderError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.extend(request.messages.into_iter().map(|m| WireMessage {
            role: m.role,
            content: m.content,
        }));

        let body = ChatCompletionsRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| error::from_transport(PROVIDER_ID, e, 0))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(error::from_status(PROVIDER_ID, status, body));
        }

        let parsed: ChatCompletionsResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::Serialization {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Serialization {
                provider: PROVIDER_ID.to_string(),
                message: "response has no choices".to_string(),
            })?;
        debug!(model = %self.model, chars = content.len(), "openai completion received");

        Ok(ProviderCompletion {
            content,
            usage: parsed.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest::single_turn("be brief", "say hi", 64)
    }

    #[tokio::test]
    async fn test_complete_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": "hi"}}],
                    "usage": {"prompt_tokens": 4, "completion_tokens": 1, "total_tokens": 5}}"#,
            )
            .create_async()
            .await;

        let provider =
            OpenAiProvider::new("test-key".to_string(), "gpt-4o".to_string(), Some(server.url()))
                .unwrap();

        let completion = provider.complete(request()).await.unwrap();
        assert_eq!(completion.content, "hi");
        assert_eq!(completion.usage.unwrap().output_tokens, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_insufficient_quota_maps_to_quota_exhausted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body(r#"{"error": {"code": "insufficient_quota"}}"#)
            .create_async()
            .await;

        let provider =
            OpenAiProvider::new("test-key".to_string(), "gpt-4o".to_string(), Some(server.url()))
                .unwrap();

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::QuotaExhausted { .. }));
        assert!(err.is_fallback_eligible());
    }

    #[tokio::test]
    async fn test_empty_choices_is_serialization_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let provider =
            OpenAiProvider::new("test-key".to_string(), "gpt-4o".to_string(), Some(server.url()))
                .unwrap();

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Serialization { .. }));
    }
}
