//! Implementation of the `redliner contract` commands.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::cli::engine::open_database;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::types::ContractCommands;
use crate::domain::models::ContractDocument;
use crate::domain::ports::DocumentStore;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::sqlite::SqliteDocumentStore;

#[derive(Debug, serde::Serialize)]
struct ContractAddOutput {
    contract_id: String,
    plain_text_chars: usize,
    has_html: bool,
    package_ref: Option<String>,
}

impl CommandOutput for ContractAddOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Stored contract {}", self.contract_id)];
        lines.push(format!("  plain text: {} chars", self.plain_text_chars));
        lines.push(format!(
            "  markup: {}",
            if self.has_html { "yes" } else { "no" }
        ));
        if let Some(package_ref) = &self.package_ref {
            lines.push(format!("  package: {package_ref}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct ContractShowOutput {
    contract_id: String,
    updated_at: String,
    package_ref: Option<String>,
    plain_text: String,
    html: Option<String>,
}

impl CommandOutput for ContractShowOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Contract {}", self.contract_id),
            format!("  updated: {}", self.updated_at),
        ];
        if let Some(package_ref) = &self.package_ref {
            lines.push(format!("  package: {package_ref}"));
        }
        lines.push(String::new());
        lines.push(truncate(&self.plain_text, 2000));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

async fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

pub async fn execute(command: ContractCommands, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    let db = open_database(&config).await?;
    let store = SqliteDocumentStore::new(db.pool().clone());

    let result = match command {
        ContractCommands::Add {
            contract_id,
            text,
            html,
            package_ref,
        } => add(&store, contract_id, &text, html, package_ref, json_mode).await,
        ContractCommands::Show { contract_id } => show(&store, &contract_id, json_mode).await,
    };

    db.close().await;
    result
}

async fn add(
    store: &SqliteDocumentStore,
    contract_id: String,
    text: &Path,
    html: Option<PathBuf>,
    package_ref: Option<String>,
    json_mode: bool,
) -> Result<()> {
    let plain_text = read_file(text).await?;
    let html = match html {
        Some(path) => Some(read_file(&path).await?),
        None => None,
    };

    let document = ContractDocument {
        contract_id: contract_id.clone(),
        plain_text,
        html,
        package_ref,
        updated_at: Utc::now(),
    };
    store.upsert(&document).await?;

    let output_data = ContractAddOutput {
        contract_id,
        plain_text_chars: document.plain_text.chars().count(),
        has_html: document.html.is_some(),
        package_ref: document.package_ref,
    };
    output(&output_data, json_mode);
    Ok(())
}

async fn show(store: &SqliteDocumentStore, contract_id: &str, json_mode: bool) -> Result<()> {
    let document = store
        .get(contract_id)
        .await?
        .with_context(|| format!("Contract not found: {contract_id}"))?;

    let output_data = ContractShowOutput {
        contract_id: document.contract_id,
        updated_at: document.updated_at.to_rfc3339(),
        package_ref: document.package_ref,
        plain_text: document.plain_text,
        html: document.html,
    };
    output(&output_data, json_mode);
    Ok(())
}
