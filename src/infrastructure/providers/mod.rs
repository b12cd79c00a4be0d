//! Generative provider clients.

pub mod anthropic;
pub mod error;
pub mod openai;

use std::sync::Arc;

use anyhow::Result;

use crate::domain::models::{ProviderConfig, ProviderKind};
use crate::domain::ports::GenerativeProvider;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// Build a provider client from configuration.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn GenerativeProvider>> {
    match config.kind {
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicProvider::from_config(config)?)),
        ProviderKind::Openai => Ok(Arc::new(OpenAiProvider::from_config(config)?)),
    }
}
