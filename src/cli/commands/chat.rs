//! Implementation of the `redliner chat` command.

use anyhow::Result;

use crate::cli::engine::build_coordinator;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{ChatMessage, ChatResponse};
use crate::infrastructure::config::ConfigLoader;

#[derive(Debug, serde::Serialize)]
struct ChatOutput {
    #[serde(flatten)]
    response: ChatResponse,
}

impl CommandOutput for ChatOutput {
    fn to_human(&self) -> String {
        let r = &self.response;
        let mut lines = vec![r.message.content.clone()];
        if !r.proposed_edits.is_empty() {
            lines.push("\nProposed edits:".to_string());
            for edit in &r.proposed_edits {
                let reference = edit.clause_reference.as_deref().unwrap_or("(no reference)");
                lines.push(format!(
                    "  - [{}] {} {}: {}",
                    edit.change_type.as_str(),
                    edit.id,
                    reference,
                    edit.suggested_text
                ));
            }
        }
        lines.push(format!("\nvia {} [{}]", r.provider, r.model));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(
    contract_id: String,
    message: String,
    context: Option<String>,
    json_mode: bool,
) -> Result<()> {
    let config = ConfigLoader::load()?;
    let (coordinator, db) = build_coordinator(&config).await?;

    let result = coordinator
        .chat(&contract_id, &[ChatMessage::user(message)], context.as_deref())
        .await;
    db.close().await;

    let response = result?;
    output(&ChatOutput { response }, json_mode);
    Ok(())
}
