//! Implementation of the `redliner compose` command.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs;

use crate::cli::engine::build_coordinator;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{ComposeResponse, RawEdit, RawSuggestion};
use crate::infrastructure::config::ConfigLoader;

/// On-disk compose payload shape.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComposePayload {
    #[serde(default)]
    suggestions: Vec<RawSuggestion>,

    #[serde(default, alias = "edits")]
    agent_edits: Vec<RawEdit>,
}

#[derive(Debug, serde::Serialize)]
struct ComposeOutput {
    #[serde(flatten)]
    response: ComposeResponse,
}

impl CommandOutput for ComposeOutput {
    fn to_human(&self) -> String {
        let r = &self.response;
        let mut lines = vec![format!(
            "Draft {} ({:?} / {:?}) via {} [{}]",
            r.draft_id,
            r.cache_status,
            r.html_source,
            r.provider,
            r.model
        )];
        if let Some(summary) = &r.summary {
            lines.push(format!("\nSummary: {summary}"));
        }
        if !r.applied_changes.is_empty() {
            lines.push("\nApplied changes:".to_string());
            for change in &r.applied_changes {
                lines.push(format!("  - {change}"));
            }
        }
        if !r.unmatched_edits.is_empty() {
            lines.push("\nUnmatched edits:".to_string());
            for gap in &r.unmatched_edits {
                lines.push(format!("  - {}: {}", gap.edit_id, gap.reason));
            }
        }
        if let Some(asset_ref) = &r.asset_ref {
            lines.push(format!("\nPatched package: {asset_ref}"));
        }
        lines.push(String::new());
        lines.push(truncate(&r.updated_contract, 2000));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

async fn load_payload(payload: Option<PathBuf>, inline: Option<String>) -> Result<ComposePayload> {
    let raw = match (payload, inline) {
        (Some(path), _) => fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, Some(inline)) => inline,
        (None, None) => return Ok(ComposePayload::default()),
    };
    serde_json::from_str(&raw).context("Invalid compose payload JSON")
}

pub async fn execute(
    contract_id: String,
    payload: Option<PathBuf>,
    edits: Option<String>,
    json_mode: bool,
) -> Result<()> {
    let payload = load_payload(payload, edits).await?;
    let config = ConfigLoader::load()?;
    let (coordinator, db) = build_coordinator(&config).await?;

    let result = coordinator
        .compose(&contract_id, &payload.suggestions, &payload.agent_edits)
        .await;
    db.close().await;

    let response = result?;
    output(&ComposeOutput { response }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_accepts_both_sections() {
        let json = r#"{
            "suggestions": [{"id": "s1", "proposedEdit": {"previousText": "a", "updatedText": "b"}}],
            "agentEdits": [{"id": "e1", "originalText": "c", "suggestedText": "d"}]
        }"#;
        let payload: ComposePayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.suggestions.len(), 1);
        assert_eq!(payload.agent_edits.len(), 1);
    }

    #[test]
    fn test_payload_sections_default_empty() {
        let payload: ComposePayload = serde_json::from_str("{}").unwrap();
        assert!(payload.suggestions.is_empty());
        assert!(payload.agent_edits.is_empty());
    }
}
