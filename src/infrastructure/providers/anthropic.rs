//! Anthropic Messages API client.

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

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER_ID: &str = "anthropic";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// HTTP client for the Anthropic Messages API.
///
/// Connection pooling comes from the shared `reqwest::Client`; the client
/// itself carries no timeout, the orchestrator bounds every call.
pub struct AnthropicProvider {
    http_client: ReqwestClient,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
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
        let key_var = config
            .api_key_env
            .as_deref()
            .unwrap_or("ANTHROPIC_API_KEY");
        let api_key = std::env::var(key_var)
            .with_context(|| format!("Missing API key environment variable {key_var}"))?;
        Self::new(api_key, config.model.clone(), config.base_url.clone())
    }
}

#[async_trait]
impl GenerativeProvider for AnthropicProvider {
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
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system,
            messages: request
                .messages
                .into_iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            temperature: request.temperature,
        };

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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

        let parsed: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::Serialization {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                })?;

        let content: String = parsed
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();
        debug!(model = %self.model, chars = content.len(), "anthropic completion received");

        Ok(ProviderCompletion {
            content,
            usage: parsed.usage.map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }
}
