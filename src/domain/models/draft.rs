//! Draft snapshots and the compose/chat response surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where the response's HTML came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HtmlSource {
    /// Straight from the generative rewrite.
    Llm,
    /// The unmodified source document.
    Original,
    /// Produced by the structural patcher or the block-diff fallback.
    Patched,
    /// Served from the snapshot cache.
    Cached,
}

/// Whether the snapshot cache answered the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// An individual edit the patcher could not place.
///
/// Gaps are metadata, not errors: they never fail a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchGap {
    pub edit_id: String,
    pub reason: String,
}

/// The cached result of a draft computation, keyed by
/// `(contract_id, draft_key)`. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub contract_id: String,
    pub draft_key: String,
    pub html: Option<String>,
    pub plain_text: String,
    pub summary: Option<String>,
    pub applied_changes: Vec<String>,
    /// Pointer to a patched structured package, when one was produced.
    pub asset_ref: Option<String>,
    pub provider: String,
    pub model: String,
    pub matched_count: u32,
    pub unmatched_count: u32,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Response of the `compose` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeResponse {
    pub updated_contract: String,
    pub updated_html: Option<String>,
    pub summary: Option<String>,
    pub applied_changes: Vec<String>,
    pub provider: String,
    pub model: String,
    pub original_contract: String,
    pub original_html: Option<String>,
    pub draft_id: String,
    pub asset_ref: Option<String>,
    pub html_source: HtmlSource,
    pub cache_status: CacheStatus,
    pub unmatched_edits: Vec<PatchGap>,
}

/// A single chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Token usage reported by a provider, when available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Response of the `chat` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub proposed_edits: Vec<super::edit::Edit>,
    pub provider: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
}
